//! Layout input snapshots, pattern presets and engine settings.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::axis::AxisParams;
use crate::pattern::PatternKind;
use crate::traits::SlotHost;

/// Default axis parameters for one pattern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutPreset {
    pub inner: AxisParams,
    pub outer: AxisParams,
}

impl LayoutPreset {
    pub fn for_kind(kind: PatternKind) -> Self {
        let (inner, outer) = match kind {
            PatternKind::Cloud => (
                AxisParams::new(30, 1.0, 1.0, 30.0, 1.5),
                AxisParams::new(30, 1.0, 0.5, 30.0, 0.0),
            ),
            PatternKind::SinCos => (
                AxisParams::new(30, 1.0, 0.5, 30.0, -1.5),
                AxisParams::new(30, 1.0, 0.5, 30.0, 0.0),
            ),
            PatternKind::Gauss => (
                AxisParams::new(30, 0.5, 0.0, 30.0, -7.5),
                AxisParams::new(30, 0.5, 1.25, 30.0, -7.5),
            ),
            PatternKind::Boid => (
                AxisParams::new(30, 0.05, 1.0, 30.0, -0.6),
                AxisParams::new(30, 0.05, 1.0, 30.0, -0.6),
            ),
        };
        Self { inner, outer }
    }
}

/// Everything one layout pass reads. Immutable for the duration of the pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfiguration {
    /// Registry id of the selected pattern, e.g. `"CLOUD"`.
    pub pattern: String,
    /// Host frame the configuration was sampled at.
    #[serde(default)]
    pub frame: i64,
    pub inner: AxisParams,
    pub outer: AxisParams,
}

impl LayoutConfiguration {
    pub fn new(pattern: impl Into<String>, inner: AxisParams, outer: AxisParams) -> Self {
        Self {
            pattern: pattern.into(),
            frame: 0,
            inner,
            outer,
        }
    }

    pub fn preset(kind: PatternKind) -> Self {
        Self::from_preset(kind.id(), LayoutPreset::for_kind(kind))
    }

    pub fn from_preset(pattern: impl Into<String>, preset: LayoutPreset) -> Self {
        Self::new(pattern, preset.inner, preset.outer)
    }

    pub fn with_frame(mut self, frame: i64) -> Self {
        self.frame = frame;
        self
    }

    /// Re-reads the host-owned parts (frame, pattern selection).
    pub fn refresh_from_host<H: SlotHost + ?Sized>(&mut self, host: &H) {
        self.frame = host.current_frame();
        self.pattern = host.current_pattern_selection();
    }

    /// Slots a full pass would place.
    pub fn total_slots(&self) -> usize {
        self.inner.loop_count as usize * self.outer.loop_count as usize
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid layout configuration JSON.")
    }
}

impl Default for LayoutConfiguration {
    fn default() -> Self {
        Self::preset(PatternKind::Cloud)
    }
}

/// What to do with an invocation that arrives while a pass is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Drop the invocation.
    Reject,
    /// Keep the latest configuration and replay it once the running pass ends.
    QueueRetry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Name shared by all slots; numbered slots append `.NNNN`.
    pub slot_prefix: String,
    /// Zero-padded width of the slot number.
    pub digits: usize,
    /// Uniform scale applied to every pattern position so a 10x10 to 40x40
    /// array stays close to unit size.
    pub scale_factor: f64,
    /// Report progress every this many placed slots.
    pub progress_interval: usize,
    pub busy_policy: BusyPolicy,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            slot_prefix: "Objects".to_string(),
            digits: 4,
            scale_factor: 0.1,
            progress_interval: 100,
            busy_policy: BusyPolicy::QueueRetry,
        }
    }
}

impl EngineSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(json).context("Invalid engine settings JSON.")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.slot_prefix.is_empty() {
            anyhow::bail!("slot_prefix must not be empty.");
        }
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            anyhow::bail!("scale_factor must be positive.");
        }
        if self.progress_interval == 0 {
            anyhow::bail!("progress_interval must be greater than zero.");
        }
        Ok(())
    }
}
