use std::collections::BTreeSet;

use tracing::warn;

/// Size of the process-lifetime game variable bank.
pub const GAME_VARIABLE_COUNT: usize = 256;

/// Scene-scoped ("cube") variables. Sized by the construction-time scan and
/// zeroed on every scene (re)load; the array only ever grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneVariables {
    values: Vec<i32>,
}

impl SceneVariables {
    pub fn with_len(len: usize) -> Self {
        Self {
            values: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    pub fn get(&self, index: u16) -> Option<i32> {
        self.values.get(usize::from(index)).copied()
    }

    pub fn read(&mut self, index: u16) -> i32 {
        self.ensure_slot(index);
        self.values[usize::from(index)]
    }

    pub fn write(&mut self, index: u16, value: i32) {
        self.ensure_slot(index);
        self.values[usize::from(index)] = value;
    }

    // The scan should have sized the bank already; content that slipped past it
    // grows the array instead of failing the scene.
    fn ensure_slot(&mut self, index: u16) {
        let needed = usize::from(index) + 1;
        if needed > self.values.len() {
            warn!(
                index,
                previous_len = self.values.len(),
                "scene_variable_grown"
            );
            self.values.resize(needed, 0);
        }
    }
}

/// Game-scoped variables shared by every scene for the lifetime of the
/// session, plus the set of indices ever read or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameVariables {
    values: Vec<i32>,
    touched: BTreeSet<u16>,
}

impl Default for GameVariables {
    fn default() -> Self {
        Self::with_len(GAME_VARIABLE_COUNT)
    }
}

impl GameVariables {
    pub fn with_len(len: usize) -> Self {
        Self {
            values: vec![0; len],
            touched: BTreeSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads without recording the access.
    pub fn get(&self, index: u16) -> Option<i32> {
        self.values.get(usize::from(index)).copied()
    }

    pub fn read(&mut self, index: u16) -> i32 {
        self.ensure_slot(index);
        self.touched.insert(index);
        self.values[usize::from(index)]
    }

    pub fn write(&mut self, index: u16, value: i32) {
        self.ensure_slot(index);
        self.touched.insert(index);
        self.values[usize::from(index)] = value;
    }

    /// Indices ever read or written, ascending.
    pub fn touched(&self) -> impl Iterator<Item = u16> + '_ {
        self.touched.iter().copied()
    }

    fn ensure_slot(&mut self, index: u16) {
        let needed = usize::from(index) + 1;
        if needed > self.values.len() {
            warn!(
                index,
                previous_len = self.values.len(),
                "game_variable_grown"
            );
            self.values.resize(needed, 0);
        }
    }
}
