//! GeoPoint store.
//!
//! Holds at most one start and one end point, plus the selection epoch that
//! tags every route request issued for the current selection cycle.

use serde::Serialize;

use crate::model::{GeoPoint, Role};

/// The two-slot point selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PointStore {
    start: Option<GeoPoint>,
    end: Option<GeoPoint>,
    selection_epoch: u64,
}

impl PointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the slot for `role`.
    ///
    /// Returns `false` and changes nothing if that slot is already set.
    pub fn pick(&mut self, point: GeoPoint, role: Role) -> bool {
        let slot = match role {
            Role::Start => &mut self.start,
            Role::End => &mut self.end,
        };

        if slot.is_some() {
            return false;
        }

        *slot = Some(point);
        true
    }

    /// The slot the next map click fills, or `None` once both are set.
    pub fn next_role(&self) -> Option<Role> {
        match (self.start, self.end) {
            (None, _) => Some(Role::Start),
            (Some(_), None) => Some(Role::End),
            (Some(_), Some(_)) => None,
        }
    }

    /// Clear both slots and start a new selection cycle.
    ///
    /// Returns the new epoch.
    pub fn reset(&mut self) -> u64 {
        self.start = None;
        self.end = None;
        self.selection_epoch += 1;
        self.selection_epoch
    }

    pub fn start(&self) -> Option<GeoPoint> {
        self.start
    }

    pub fn end(&self) -> Option<GeoPoint> {
        self.end
    }

    pub fn selection_epoch(&self) -> u64 {
        self.selection_epoch
    }

    /// Both points, once the selection is complete.
    pub fn pair(&self) -> Option<(GeoPoint, GeoPoint)> {
        self.start.zip(self.end)
    }
}
