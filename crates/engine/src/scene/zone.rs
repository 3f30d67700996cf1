use crate::app::{NodeId, Vec3};
use crate::content::{PointData, ZoneData, ZoneKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ZoneRunState {
    pub entered: bool,
    /// Set on entry, cleared by the first script read.
    pub pending: bool,
    /// Set on exit, cleared by the next entry.
    pub ended: bool,
}

#[derive(Debug, Clone)]
pub struct Zone {
    index: usize,
    name: String,
    kind: ZoneKind,
    min: Vec3,
    max: Vec3,
    node: Option<NodeId>,
    state: ZoneRunState,
}

impl Zone {
    pub fn from_data(index: usize, data: &ZoneData, node: Option<NodeId>) -> Self {
        Self {
            index,
            name: data.name.clone(),
            kind: data.kind,
            min: data.min,
            max: data.max,
            node,
            state: ZoneRunState::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ZoneKind {
        self.kind
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn state(&self) -> ZoneRunState {
        self.state
    }

    pub fn contains(&self, position: Vec3) -> bool {
        (self.min.x..=self.max.x).contains(&position.x)
            && (self.min.y..=self.max.y).contains(&position.y)
            && (self.min.z..=self.max.z).contains(&position.z)
    }

    pub fn enter(&mut self) {
        if self.state.entered {
            return;
        }
        self.state = ZoneRunState {
            entered: true,
            pending: true,
            ended: false,
        };
    }

    pub fn leave(&mut self) {
        if !self.state.entered {
            return;
        }
        self.state.entered = false;
        self.state.ended = true;
    }

    pub fn take_trigger(&mut self) -> bool {
        std::mem::take(&mut self.state.pending)
    }

    pub fn reset(&mut self) {
        self.state = ZoneRunState::default();
    }
}

#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
}

impl ZoneRegistry {
    pub fn from_zones(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Zone> {
        self.zones.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    /// Updates run-state for a tracked position and returns the zones it just
    /// entered, in index order.
    pub fn track_position(&mut self, position: Vec3) -> Vec<usize> {
        let mut entered = Vec::new();
        for zone in &mut self.zones {
            let inside = zone.contains(position);
            if inside && !zone.state.entered {
                zone.enter();
                entered.push(zone.index);
            } else if !inside && zone.state.entered {
                zone.leave();
            }
        }
        entered
    }

    pub fn reset(&mut self) {
        self.zones.iter_mut().for_each(Zone::reset);
    }
}

#[derive(Debug, Clone)]
pub struct Point {
    index: usize,
    name: String,
    position: Vec3,
    node: Option<NodeId>,
}

impl Point {
    pub fn from_data(index: usize, data: &PointData, node: Option<NodeId>) -> Self {
        Self {
            index,
            name: data.name.clone(),
            position: data.position,
            node,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn node(&self) -> Option<NodeId> {
        self.node
    }
}

#[derive(Debug, Clone, Default)]
pub struct PointRegistry {
    points: Vec<Point>,
}

impl PointRegistry {
    pub fn from_points(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&Point> {
        self.points.iter().find(|point| point.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Point> {
        self.points.iter()
    }
}
