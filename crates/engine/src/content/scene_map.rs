use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::debug;

use crate::scripting::GameVariables;

use super::types::{EnvInfo, SceneIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneMapErrorCode {
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    MissingAttribute,
    InvalidValue,
    DuplicateScene,
    MissingScene,
}

#[derive(Debug, Clone)]
pub struct SceneMapError {
    pub code: SceneMapErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for SceneMapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for SceneMapError {}

/// Where an island scene sits: which island, which section of it, and which
/// variant of the island it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandSlot {
    pub island: String,
    pub section: usize,
    pub variant: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneKind {
    Island(IslandSlot),
    Isometric { iso_index: u32 },
}

impl SceneKind {
    pub fn is_island(&self) -> bool {
        matches!(self, SceneKind::Island(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneMapEntry {
    pub index: SceneIndex,
    pub kind: SceneKind,
}

/// Substitutes `to` for `from` while game variable `game_var` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IslandOverride {
    pub game_var: u16,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneMap {
    entries: Vec<SceneMapEntry>,
    islands: HashMap<String, EnvInfo>,
    overrides: Vec<IslandOverride>,
}

impl SceneMap {
    /// Entries must cover indices `0..entries.len()` in order.
    pub fn from_parts(
        entries: Vec<SceneMapEntry>,
        islands: HashMap<String, EnvInfo>,
        overrides: Vec<IslandOverride>,
    ) -> Self {
        debug_assert!(entries
            .iter()
            .enumerate()
            .all(|(position, entry)| entry.index.0 as usize == position));
        Self {
            entries,
            islands,
            overrides,
        }
    }

    pub fn parse(file_path: &Path, raw: &str) -> Result<Self, SceneMapError> {
        parse_scene_map_document(file_path, raw)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: SceneIndex) -> Option<&SceneMapEntry> {
        self.entries.get(index.0 as usize)
    }

    pub fn entries(&self) -> &[SceneMapEntry] {
        &self.entries
    }

    /// Every other island scene on the same island and variant, ascending.
    pub fn side_scene_indices(&self, index: SceneIndex) -> Vec<SceneIndex> {
        let Some(SceneKind::Island(main)) = self.entry(index).map(|entry| &entry.kind) else {
            return Vec::new();
        };
        self.entries
            .iter()
            .filter(|entry| entry.index != index)
            .filter_map(|entry| match &entry.kind {
                SceneKind::Island(slot)
                    if slot.island == main.island && slot.variant == main.variant =>
                {
                    Some(entry.index)
                }
                _ => None,
            })
            .collect()
    }

    /// Island name after override rules; the first matching rule wins.
    pub fn resolve_island_name(&self, island: &str, game_vars: &GameVariables) -> String {
        for rule in &self.overrides {
            if rule.from == island && game_vars.get(rule.game_var).unwrap_or(0) != 0 {
                debug!(from = island, to = %rule.to, game_var = rule.game_var, "island_overridden");
                return rule.to.clone();
            }
        }
        island.to_string()
    }

    /// Island environment by resolved name; isometric scenes pass `None`.
    pub fn env_for(&self, island: Option<&str>) -> EnvInfo {
        island
            .and_then(|name| self.islands.get(name))
            .copied()
            .unwrap_or_default()
    }

    pub fn next(&self, index: SceneIndex) -> SceneIndex {
        let len = self.entries.len() as u32;
        SceneIndex((index.0 + 1) % len.max(1))
    }

    pub fn previous(&self, index: SceneIndex) -> SceneIndex {
        if index.0 > 0 {
            SceneIndex(index.0 - 1)
        } else {
            SceneIndex((self.entries.len() as u32).saturating_sub(1))
        }
    }
}

fn parse_scene_map_document(file_path: &Path, raw: &str) -> Result<SceneMap, SceneMapError> {
    let doc = Document::parse(raw).map_err(|error| SceneMapError {
        code: SceneMapErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "SceneMap" {
        return Err(error_at_node(
            SceneMapErrorCode::InvalidRoot,
            "root element must be <SceneMap>".to_string(),
            file_path,
            &doc,
            root,
        ));
    }

    let mut scenes = BTreeMap::<u32, SceneMapEntry>::new();
    let mut islands = HashMap::<String, EnvInfo>::new();
    let mut overrides = Vec::<IslandOverride>::new();

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "Scene" => {
                let entry = parse_scene(file_path, &doc, child)?;
                let index = entry.index.0;
                if scenes.insert(index, entry).is_some() {
                    return Err(error_at_node(
                        SceneMapErrorCode::DuplicateScene,
                        format!("scene index {index} is declared more than once"),
                        file_path,
                        &doc,
                        child,
                    ));
                }
            }
            "Island" => {
                let name = required_attr(file_path, &doc, child, "name")?;
                let env = EnvInfo {
                    sky_color: parse_color(file_path, &doc, child, "skyColor")?,
                    fog_density: parse_attr(file_path, &doc, child, "fogDensity")?,
                };
                islands.insert(name, env);
            }
            "IslandOverride" => overrides.push(IslandOverride {
                game_var: parse_attr(file_path, &doc, child, "gameVar")?,
                from: required_attr(file_path, &doc, child, "from")?,
                to: required_attr(file_path, &doc, child, "to")?,
            }),
            other => {
                return Err(error_at_node(
                    SceneMapErrorCode::UnknownElement,
                    format!(
                        "unsupported element <{other}>; expected <Scene>, <Island> or <IslandOverride>"
                    ),
                    file_path,
                    &doc,
                    child,
                ))
            }
        }
    }

    // Scene indices double as array positions, so the map must have no holes.
    for (position, index) in scenes.keys().enumerate() {
        if *index as usize != position {
            return Err(SceneMapError {
                code: SceneMapErrorCode::MissingScene,
                message: format!("scene index {position} is missing; indices must be contiguous"),
                file_path: file_path.to_path_buf(),
                location: None,
            });
        }
    }

    Ok(SceneMap::from_parts(
        scenes.into_values().collect(),
        islands,
        overrides,
    ))
}

fn parse_scene(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> Result<SceneMapEntry, SceneMapError> {
    let index = SceneIndex(parse_attr(file_path, doc, node, "index")?);
    let kind = required_attr(file_path, doc, node, "kind")?;
    let kind = match kind.as_str() {
        "island" => SceneKind::Island(IslandSlot {
            island: required_attr(file_path, doc, node, "island")?,
            section: parse_attr(file_path, doc, node, "section")?,
            variant: parse_attr(file_path, doc, node, "variant")?,
        }),
        "iso" => SceneKind::Isometric {
            iso_index: parse_attr(file_path, doc, node, "isoIndex")?,
        },
        _ => {
            return Err(error_at_node(
                SceneMapErrorCode::InvalidValue,
                format!("invalid scene kind '{kind}'; allowed values: island, iso"),
                file_path,
                doc,
                node,
            ))
        }
    };
    Ok(SceneMapEntry { index, kind })
}

fn required_attr(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<String, SceneMapError> {
    let value = node.attribute(name).map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(error_at_node(
            SceneMapErrorCode::MissingAttribute,
            format!(
                "missing attribute '{name}' on <{}>",
                node.tag_name().name()
            ),
            file_path,
            doc,
            node,
        ));
    }
    Ok(value.to_string())
}

fn parse_attr<T: std::str::FromStr>(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<T, SceneMapError> {
    let value = required_attr(file_path, doc, node, name)?;
    value.parse::<T>().map_err(|_| {
        error_at_node(
            SceneMapErrorCode::InvalidValue,
            format!("attribute '{name}' has invalid value '{value}'"),
            file_path,
            doc,
            node,
        )
    })
}

fn parse_color(
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
    name: &str,
) -> Result<[u8; 3], SceneMapError> {
    let value = required_attr(file_path, doc, node, name)?;
    let channels = value
        .split(',')
        .map(|channel| channel.trim().parse::<u8>())
        .collect::<Result<Vec<_>, _>>();
    match channels.as_deref() {
        Ok([r, g, b]) => Ok([*r, *g, *b]),
        _ => Err(error_at_node(
            SceneMapErrorCode::InvalidValue,
            format!("attribute '{name}' must be three comma-separated bytes, got '{value}'"),
            file_path,
            doc,
            node,
        )),
    }
}

fn error_at_node(
    code: SceneMapErrorCode,
    message: String,
    file_path: &Path,
    doc: &Document<'_>,
    node: Node<'_, '_>,
) -> SceneMapError {
    let pos = doc.text_pos_at(node.range().start);
    SceneMapError {
        code,
        message,
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }),
    }
}
