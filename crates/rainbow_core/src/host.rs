//! In-memory scene host.
//!
//! Useful for previews, headless batch runs and tests: keeps every slot in a
//! sorted map and can be told to fail on chosen names.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::naming::count_slot_names;
use crate::traits::SlotHost;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub position: Vector3<f64>,
    pub color: u32,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    slots: BTreeMap<String, Slot>,
    failing: BTreeSet<String>,
    frame: i64,
    pattern_selection: String,
    progress: Vec<(f32, usize)>,
    count_failure: Option<HostError>,
}

impl MemoryHost {
    pub fn new(pattern_selection: impl Into<String>) -> Self {
        Self {
            pattern_selection: pattern_selection.into(),
            ..Self::default()
        }
    }

    /// Pre-populates `count` slots (`prefix.0001` ..) at the origin.
    pub fn with_existing_slots(mut self, prefix: &str, digits: usize, count: usize) -> Self {
        for index in 1..=count {
            self.slots.insert(
                crate::naming::slot_name(prefix, digits, index),
                Slot {
                    position: Vector3::zeros(),
                    color: 0,
                },
            );
        }
        self
    }

    /// Placement of `name` will fail from now on.
    pub fn fail_on(&mut self, name: impl Into<String>) {
        self.failing.insert(name.into());
    }

    /// Slot counting will fail with `message` from now on.
    pub fn fail_counting(&mut self, message: impl Into<String>) {
        self.count_failure = Some(HostError::new(message));
    }

    pub fn set_frame(&mut self, frame: i64) {
        self.frame = frame;
    }

    pub fn set_pattern_selection(&mut self, id: impl Into<String>) {
        self.pattern_selection = id.into();
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    pub fn slots(&self) -> &BTreeMap<String, Slot> {
        &self.slots
    }

    pub fn progress(&self) -> &[(f32, usize)] {
        &self.progress
    }
}

impl SlotHost for MemoryHost {
    fn place_or_update_slot(
        &mut self,
        name: &str,
        position: Vector3<f64>,
        color: u32,
        create_if_missing: bool,
    ) -> Result<(), HostError> {
        if self.failing.contains(name) {
            return Err(HostError::new(format!("Slot {name} is locked")));
        }
        match self.slots.get_mut(name) {
            Some(slot) => {
                slot.position = position;
                slot.color = color;
            }
            None if create_if_missing => {
                self.slots
                    .insert(name.to_string(), Slot { position, color });
            }
            None => return Err(HostError::new(format!("No slot named {name}"))),
        }
        Ok(())
    }

    fn count_existing_slots(&self, prefix: &str) -> Result<usize, HostError> {
        if let Some(err) = &self.count_failure {
            return Err(err.clone());
        }
        Ok(count_slot_names(prefix, self.slots.keys().map(String::as_str)))
    }

    fn report_progress(&mut self, percent: f32, slots_done: usize) {
        self.progress.push((percent, slots_done));
    }

    fn current_frame(&self) -> i64 {
        self.frame
    }

    fn current_pattern_selection(&self) -> String {
        self.pattern_selection.clone()
    }
}
