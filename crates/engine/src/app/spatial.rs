use std::collections::HashMap;
use std::ops::Add;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3 {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// Opaque render-side scene graph. The engine only creates, parents, moves and
/// hides nodes; geometry and materials stay on the renderer's side.
pub trait SpatialGraph {
    fn create_node(&mut self, name: &str) -> NodeId;
    fn add_child(&mut self, parent: NodeId, child: NodeId);
    /// Detaches `node` from its parent and releases it with its whole subtree.
    fn remove_node(&mut self, node: NodeId);
    fn set_position(&mut self, node: NodeId, position: Vec3);
    fn set_visible(&mut self, node: NodeId, visible: bool);
    /// Selects the root the renderer draws; `None` clears the view.
    fn set_active_root(&mut self, root: Option<NodeId>);
    fn apply_scenery_props(&mut self, props: &HashMap<String, Value>);
}

#[derive(Debug, Clone)]
pub struct SpatialNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub position: Vec3,
    pub visible: bool,
}

#[derive(Debug, Default)]
struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Headless [`SpatialGraph`] that keeps the hierarchy in memory.
#[derive(Debug, Default)]
pub struct NodeTree {
    allocator: NodeIdAllocator,
    nodes: HashMap<NodeId, SpatialNode>,
    active_root: Option<NodeId>,
    scenery_props: HashMap<String, Value>,
}

impl NodeTree {
    pub fn node(&self, id: NodeId) -> Option<&SpatialNode> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn active_root(&self) -> Option<NodeId> {
        self.active_root
    }

    pub fn scenery_props(&self) -> &HashMap<String, Value> {
        &self.scenery_props
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        let mut matches = self
            .nodes
            .iter()
            .filter(|(_, node)| node.name == name)
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();
        matches.sort();
        matches.first().copied()
    }

    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        let mut node = self.nodes.get(&id)?;
        let mut position = node.position;
        while let Some(parent) = node.parent {
            node = self.nodes.get(&parent)?;
            position = position + node.position;
        }
        Some(position)
    }

    fn detach(&mut self, id: NodeId) {
        let parent = self.nodes.get(&id).and_then(|node| node.parent);
        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.children.retain(|child| *child != id);
            }
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = None;
        }
    }
}

impl SpatialGraph for NodeTree {
    fn create_node(&mut self, name: &str) -> NodeId {
        let id = self.allocator.allocate();
        self.nodes.insert(
            id,
            SpatialNode {
                name: name.to_string(),
                parent: None,
                children: Vec::new(),
                position: Vec3::ZERO,
                visible: true,
            },
        );
        id
    }

    fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || !self.nodes.contains_key(&parent) || !self.nodes.contains_key(&child)
        {
            return;
        }
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
    }

    fn remove_node(&mut self, node: NodeId) {
        self.detach(node);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(removed) = self.nodes.remove(&id) {
                stack.extend(removed.children);
            }
            if self.active_root == Some(id) {
                self.active_root = None;
            }
        }
    }

    fn set_position(&mut self, node: NodeId, position: Vec3) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.position = position;
        }
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(&node) {
            node.visible = visible;
        }
    }

    fn set_active_root(&mut self, root: Option<NodeId>) {
        self.active_root = root.filter(|id| self.nodes.contains_key(id));
    }

    fn apply_scenery_props(&mut self, props: &HashMap<String, Value>) {
        self.scenery_props = props.clone();
    }
}
