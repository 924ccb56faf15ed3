//! One axis of the nested inner/outer slot loop.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LayoutError;

/// Largest loop count accepted on either axis.
pub const MAX_LOOPS: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisRole {
    Inner,
    Outer,
}

impl fmt::Display for AxisRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisRole::Inner => f.write_str("Inner"),
            AxisRole::Outer => f.write_str("Outer"),
        }
    }
}

/// The five live parameters of one axis.
/// Patterns use them roughly as `fn(frequency * angle + offset) * radius`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisParams {
    /// Slots along this axis.
    pub loop_count: u32,
    /// Spacing between successive index magnitudes.
    pub step: f64,
    pub frequency: f64,
    pub radius: f64,
    pub offset: f64,
}

impl AxisParams {
    pub const fn new(loop_count: u32, step: f64, frequency: f64, radius: f64, offset: f64) -> Self {
        Self {
            loop_count,
            step,
            frequency,
            radius,
            offset,
        }
    }

    pub fn validate(&self, axis: AxisRole) -> Result<(), LayoutError> {
        let invalid = |reason: String| LayoutError::InvalidConfiguration { axis, reason };
        if !(1..=MAX_LOOPS).contains(&self.loop_count) {
            return Err(invalid(format!(
                "loop count must be between 1 and {MAX_LOOPS}, got {}",
                self.loop_count
            )));
        }
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(invalid(format!("step must be positive, got {}", self.step)));
        }
        if !self.frequency.is_finite() || !self.radius.is_finite() || !self.offset.is_finite() {
            return Err(invalid(
                "frequency, radius and offset must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loop state for one axis: live parameters, derived bounds and the
/// snapshot committed after the last successful layout pass.
#[derive(Debug, Clone)]
pub struct LoopRange {
    role: AxisRole,
    params: AxisParams,
    min: f64,
    max: f64,
    range: f64,
    committed: Option<AxisParams>,
}

impl LoopRange {
    /// Builds an axis from default parameters (normally a pattern preset).
    pub fn new(role: AxisRole, defaults: AxisParams) -> Result<Self, LayoutError> {
        defaults.validate(role)?;
        let mut axis = Self {
            role,
            params: defaults,
            min: 0.0,
            max: 0.0,
            range: 0.0,
            committed: None,
        };
        axis.recompute_bounds();
        Ok(axis)
    }

    /// Replaces the live parameters. On failure the previous state is kept.
    pub fn update(&mut self, params: AxisParams) -> Result<(), LayoutError> {
        params.validate(self.role)?;
        self.params = params;
        self.recompute_bounds();
        Ok(())
    }

    fn recompute_bounds(&mut self) {
        self.max = self.params.loop_count as f64 * self.params.step;
        self.range = self.max - self.min;
    }

    pub fn role(&self) -> AxisRole {
        self.role
    }

    pub fn params(&self) -> &AxisParams {
        &self.params
    }

    pub fn loop_count(&self) -> u32 {
        self.params.loop_count
    }

    pub fn step(&self) -> f64 {
        self.params.step
    }

    pub fn frequency(&self) -> f64 {
        self.params.frequency
    }

    pub fn radius(&self) -> f64 {
        self.params.radius
    }

    pub fn offset(&self) -> f64 {
        self.params.offset
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    /// Rescales a loop magnitude onto the line through `(0, 1)` and
    /// `(loop_count - 1, loop_count * step)`.
    pub fn linear_map(&self, index: f64) -> Result<f64, LayoutError> {
        if self.params.loop_count < 2 {
            return Err(LayoutError::DegenerateAxis { axis: self.role });
        }
        let x2 = (self.params.loop_count - 1) as f64;
        let y1 = 1.0;
        let y2 = self.max;
        let a = (y2 - y1) / x2;
        let b = y2 - a * x2;
        Ok(a * index + b)
    }

    /// Index magnitudes visited by the loop: `0, step, 2 * step, ...`.
    /// Always exactly `loop_count` values.
    pub fn magnitudes(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.params.loop_count).map(move |k| self.min + k as f64 * self.params.step)
    }

    pub fn snapshot(&self) -> AxisParams {
        self.params
    }

    pub fn committed(&self) -> Option<&AxisParams> {
        self.committed.as_ref()
    }

    /// True when any live parameter differs from `previous`.
    pub fn has_changed_since(&self, previous: &AxisParams) -> bool {
        self.params != *previous
    }

    /// True when `candidate` differs from the committed snapshot, or nothing
    /// has been committed yet.
    pub fn differs_from_committed(&self, candidate: &AxisParams) -> bool {
        self.committed.as_ref() != Some(candidate)
    }

    pub fn commit(&mut self) {
        self.committed = Some(self.params);
    }
}
