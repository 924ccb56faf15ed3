//! Error taxonomy for layout passes.
//!
//! `LayoutError` aborts a pass before anything is placed. `HostError` is
//! per-slot: the engine records it and keeps going.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::axis::AxisRole;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("Invalid {axis} axis configuration: {reason}")]
    InvalidConfiguration { axis: AxisRole, reason: String },

    /// A single-slot axis has no slope for the index-to-magnitude line.
    #[error("{axis} axis has a single loop; the linear index map needs at least two loops")]
    DegenerateAxis { axis: AxisRole },

    #[error("Unknown pattern: {0}")]
    UnknownPattern(String),

    #[error("Pattern id already registered: {0}")]
    DuplicatePattern(String),

    #[error("Invalid engine settings: {0}")]
    InvalidSettings(String),

    /// The host could not say how many slots exist, so there is nothing safe to move.
    #[error("Cannot count existing slots: {0}")]
    SlotCount(HostError),
}

/// Failure reported by a host while placing or updating one slot.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for HostError {
    fn from(value: anyhow::Error) -> Self {
        Self::new(format!("{value:#}"))
    }
}

/// A slot the host could not place during an emit pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotFailure {
    pub slot_name: String,
    pub error: HostError,
}
