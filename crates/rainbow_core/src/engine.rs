//! Two-pass layout of the inner x outer slot grid.
//!
//! The extent pass evaluates the selected pattern for every slot and caches
//! the positions; the emit pass colors each cached position by its height
//! relative to the largest absolute height and hands it to the host.

use std::rc::Rc;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::axis::{AxisRole, LoopRange};
use crate::color::RainbowColorMapper;
use crate::config::{EngineSettings, LayoutConfiguration, LayoutPreset};
use crate::error::{LayoutError, SlotFailure};
use crate::gate::{EngineState, LayoutGate};
use crate::naming::slot_name;
use crate::pattern::{PatternKind, PatternRegistry};
use crate::traits::SlotHost;

/// Why a pass was requested. Ordered by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Host refresh such as a frame change; skipped when nothing changed.
    Passive,
    /// A live parameter was edited; moves existing slots.
    ParameterEdit,
    /// Explicit request to create the slots.
    Add,
}

impl Trigger {
    pub fn creates_slots(self) -> bool {
        matches!(self, Trigger::Add)
    }
}

/// One slot handed to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub slot_name: String,
    pub inner_index: u32,
    pub outer_index: u32,
    pub position: Vector3<f64>,
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutReport {
    pub records: Vec<PlacementRecord>,
    /// `inner_loops * outer_loops`, whether or not every slot was placed.
    pub planned_slots: usize,
    /// Largest absolute height; the color normalizer.
    pub z_abs: f64,
    /// Stopped early because the host had fewer slots than planned.
    pub truncated: bool,
    pub failures: Vec<SlotFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayoutOutcome {
    Completed(LayoutReport),
    /// Passive trigger with an unchanged configuration.
    Unchanged,
    /// Not creating, and the host has no slots to move.
    NoSlots,
    /// Another pass was running; `queued` tells whether this one will be replayed.
    Busy { queued: bool },
}

/// Pattern and frame of the last completed pass. Axis parameters are
/// committed on the `LoopRange`s themselves.
#[derive(Debug, Clone, PartialEq)]
struct CommitMarker {
    pattern: String,
    frame: i64,
}

struct Extent {
    z_abs: f64,
    truncated: bool,
}

#[derive(Debug)]
pub struct LayoutEngine {
    settings: EngineSettings,
    inner: LoopRange,
    outer: LoopRange,
    mapper: RainbowColorMapper,
    registry: PatternRegistry,
    gate: Rc<LayoutGate>,
    marker: Option<CommitMarker>,
    positions: Vec<Vector3<f64>>,
}

impl LayoutEngine {
    /// Creates an engine whose axes start at the Cloud preset.
    pub fn new(settings: EngineSettings) -> Result<Self, LayoutError> {
        settings
            .validate()
            .map_err(|e| LayoutError::InvalidSettings(format!("{e:#}")))?;
        let preset = LayoutPreset::for_kind(PatternKind::Cloud);
        Ok(Self {
            settings,
            inner: LoopRange::new(AxisRole::Inner, preset.inner)?,
            outer: LoopRange::new(AxisRole::Outer, preset.outer)?,
            mapper: RainbowColorMapper::new(),
            registry: PatternRegistry::new(),
            gate: Rc::new(LayoutGate::new()),
            marker: None,
            positions: Vec::new(),
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// For registering user patterns.
    pub fn registry_mut(&mut self) -> &mut PatternRegistry {
        &mut self.registry
    }

    pub fn inner(&self) -> &LoopRange {
        &self.inner
    }

    pub fn outer(&self) -> &LoopRange {
        &self.outer
    }

    pub fn state(&self) -> EngineState {
        self.gate.state()
    }

    /// Shared handle to the busy gate, for drivers that must check it
    /// without borrowing the engine.
    pub fn gate(&self) -> Rc<LayoutGate> {
        Rc::clone(&self.gate)
    }

    /// True when `config` differs from the last completed pass, or no pass
    /// has completed yet.
    pub fn has_changed(&self, config: &LayoutConfiguration) -> bool {
        let marker = CommitMarker {
            pattern: config.pattern.clone(),
            frame: config.frame,
        };
        self.marker.as_ref() != Some(&marker)
            || self.inner.differs_from_committed(&config.inner)
            || self.outer.differs_from_committed(&config.outer)
    }

    /// Runs one layout pass for `config`.
    ///
    /// Configuration errors abort before the host is touched. Host failures
    /// for single slots are collected in the report and the pass continues.
    pub fn run<H: SlotHost + ?Sized>(
        &mut self,
        config: &LayoutConfiguration,
        trigger: Trigger,
        host: &mut H,
    ) -> Result<LayoutOutcome, LayoutError> {
        let gate = Rc::clone(&self.gate);
        let Some(ticket) = gate.try_begin() else {
            log::warn!("Layout pass already running; ignoring {trigger:?} request");
            return Ok(LayoutOutcome::Busy { queued: false });
        };

        if trigger == Trigger::Passive && !self.has_changed(config) {
            log::debug!(
                "No change since last pass (pattern {}, frame {}); skipping",
                config.pattern,
                config.frame
            );
            return Ok(LayoutOutcome::Unchanged);
        }

        self.registry.get(&config.pattern)?;
        config.inner.validate(AxisRole::Inner)?;
        config.outer.validate(AxisRole::Outer)?;
        self.inner.update(config.inner)?;
        self.outer.update(config.outer)?;

        let create = trigger.creates_slots();
        let existing = if create {
            None
        } else {
            let count = host
                .count_existing_slots(&self.settings.slot_prefix)
                .map_err(LayoutError::SlotCount)?;
            Some(count)
        };
        if existing == Some(0) {
            log::info!(
                "No {} slots to move; use an add request to create them",
                self.settings.slot_prefix
            );
            return Ok(LayoutOutcome::NoSlots);
        }

        let planned_slots = config.total_slots();
        log::info!(
            "Laying out {planned_slots} slots with pattern {} ({trigger:?})",
            config.pattern
        );
        let extent = self.extent_pass(&config.pattern, existing)?;
        self.report_progress(host, 0, planned_slots);
        ticket.enter_placing();
        let report = self.emit_pass(host, extent, create, planned_slots);

        self.inner.commit();
        self.outer.commit();
        self.marker = Some(CommitMarker {
            pattern: config.pattern.clone(),
            frame: config.frame,
        });
        log::info!(
            "Placed {} of {planned_slots} slots ({} failed)",
            report.records.len(),
            report.failures.len()
        );
        Ok(LayoutOutcome::Completed(report))
    }

    /// Evaluates every slot (outer-major) into `self.positions`.
    fn extent_pass(&mut self, pattern: &str, existing: Option<usize>) -> Result<Extent, LayoutError> {
        let inner_loops = self.inner.loop_count() as usize;
        let scale = self.settings.scale_factor;
        self.positions.clear();
        self.positions
            .reserve(inner_loops * self.outer.loop_count() as usize);

        let mut truncated = false;
        for outer_index in self.outer.magnitudes() {
            // Only whole rows are laid out when moving a limited set of slots.
            if let Some(existing) = existing {
                if existing < self.positions.len() + inner_loops {
                    truncated = true;
                    log::debug!(
                        "Only {existing} slots available; stopping after {} slots",
                        self.positions.len()
                    );
                    break;
                }
            }
            for inner_index in self.inner.magnitudes() {
                let position = self.registry.evaluate(
                    pattern,
                    inner_index,
                    outer_index,
                    &self.inner,
                    &self.outer,
                    scale,
                )?;
                self.positions.push(position);
            }
        }

        let z_max = self
            .positions
            .iter()
            .map(|p| p.z)
            .fold(f64::NEG_INFINITY, f64::max);
        let z_min = self
            .positions
            .iter()
            .map(|p| p.z)
            .fold(f64::INFINITY, f64::min);
        let z_abs = if self.positions.is_empty() {
            0.0
        } else {
            z_max.abs().max(z_min.abs())
        };

        Ok(Extent { z_abs, truncated })
    }

    fn emit_pass<H: SlotHost + ?Sized>(
        &self,
        host: &mut H,
        extent: Extent,
        create: bool,
        planned_slots: usize,
    ) -> LayoutReport {
        let inner_loops = self.inner.loop_count() as usize;
        let mut records = Vec::with_capacity(self.positions.len());
        let mut failures = Vec::new();

        for (slot, position) in self.positions.iter().enumerate() {
            let bucket = height_bucket(position.z, extent.z_abs, planned_slots);
            let color = self.mapper.eval(bucket);
            let name = slot_name(&self.settings.slot_prefix, self.settings.digits, slot + 1);

            if let Err(error) = host.place_or_update_slot(&name, *position, color, create) {
                log::warn!("Failed to place slot {name}: {error}");
                failures.push(SlotFailure {
                    slot_name: name.clone(),
                    error,
                });
            }
            records.push(PlacementRecord {
                slot_name: name,
                inner_index: (slot % inner_loops) as u32,
                outer_index: (slot / inner_loops) as u32,
                position: *position,
                color,
            });

            let done = slot + 1;
            if done % self.settings.progress_interval == 0 {
                self.report_progress(host, done, planned_slots);
            }
        }
        if records.len() % self.settings.progress_interval != 0 {
            self.report_progress(host, records.len(), planned_slots);
        }

        LayoutReport {
            records,
            planned_slots,
            z_abs: extent.z_abs,
            truncated: extent.truncated,
            failures,
        }
    }

    fn report_progress<H: SlotHost + ?Sized>(&self, host: &mut H, done: usize, planned: usize) {
        let percent = if planned == 0 {
            100.0
        } else {
            (done as f64 * 100.0 / planned as f64) as f32
        };
        host.report_progress(percent, done);
    }
}

/// Integer height bucket fed to the color mapper: `z` normalized by `z_abs`
/// and stretched over the planned slot count. A flat layout maps to 0.
pub fn height_bucket(z: f64, z_abs: f64, planned_slots: usize) -> i64 {
    if z_abs == 0.0 {
        return 0;
    }
    // `as` saturates and maps NaN to 0.
    (z / z_abs * planned_slots as f64).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisParams;
    use crate::color::unpack;
    use crate::config::BusyPolicy;
    use crate::host::MemoryHost;
    use std::f64::consts::TAU;

    fn engine() -> LayoutEngine {
        LayoutEngine::new(EngineSettings::default()).expect("engine")
    }

    fn completed(outcome: LayoutOutcome) -> LayoutReport {
        match outcome {
            LayoutOutcome::Completed(report) => report,
            other => panic!("expected a completed pass, got {other:?}"),
        }
    }

    fn grid(pattern: &str, inner_loops: u32, outer_loops: u32) -> LayoutConfiguration {
        LayoutConfiguration::new(
            pattern,
            AxisParams::new(inner_loops, 1.0, 1.0, 2.0, 0.5),
            AxisParams::new(outer_loops, 1.0, 1.0, 3.0, -0.5),
        )
    }

    #[test]
    fn full_run_emits_every_slot_outer_major() {
        let mut engine = engine();
        let mut host = MemoryHost::new("CLOUD");
        let config = LayoutConfiguration::preset(PatternKind::Cloud);
        let report = completed(engine.run(&config, Trigger::Add, &mut host).expect("run"));

        assert_eq!(report.records.len(), 900);
        assert_eq!(report.planned_slots, 900);
        assert!(!report.truncated);
        assert!(report.failures.is_empty());
        let order: Vec<(u32, u32)> = report.records[..2]
            .iter()
            .chain(&report.records[30..31])
            .map(|r| (r.inner_index, r.outer_index))
            .collect();
        assert_eq!(order, vec![(0, 0), (1, 0), (0, 1)]);
        assert_eq!(report.records[0].slot_name, "Objects.0001");
        assert_eq!(report.records[899].slot_name, "Objects.0900");
        assert_eq!(host.count_existing_slots("Objects"), Ok(900));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn cloud_reference_slot_lands_at_expected_position() {
        let mut engine = engine();
        let mut host = MemoryHost::new("CLOUD");
        let config = LayoutConfiguration::new(
            "CLOUD",
            AxisParams::new(30, 1.0, 1.0, 30.0, 1.5),
            AxisParams::new(30, 0.5, 1.0, 30.0, 0.0),
        );
        let report = completed(engine.run(&config, Trigger::Add, &mut host).expect("run"));
        let loop_angle = TAU / 450.0;
        let expected = Vector3::new(3.0 * loop_angle.sin(), 3.0 + 3.0 * loop_angle.cos(), 0.15);
        assert!((report.records[0].position - expected).norm() < 1e-12);
        let stored = host.slot("Objects.0001").expect("slot");
        assert_eq!(stored.position, report.records[0].position);
        assert_eq!(stored.color, report.records[0].color);
    }

    #[test]
    fn colors_follow_normalized_height() {
        let mut engine = engine();
        let mut host = MemoryHost::new("BOID");
        let config = grid("BOID", 4, 3);
        let report = completed(engine.run(&config, Trigger::Add, &mut host).expect("run"));

        let z_abs = report
            .records
            .iter()
            .map(|r| r.position.z.abs())
            .fold(0.0, f64::max);
        assert!((report.z_abs - z_abs).abs() < 1e-12);
        for record in &report.records {
            let bucket = (record.position.z / z_abs * 12.0).round() as i64;
            assert_eq!(record.color, RainbowColorMapper::new().eval(bucket));
        }
        // The deepest slot sits a full -12 buckets down the hue cycle.
        let deepest = report
            .records
            .iter()
            .find(|r| (r.position.z.abs() - z_abs).abs() < 1e-12)
            .expect("deepest slot");
        assert_eq!(unpack(deepest.color), [255, 0, 11]);
    }

    #[test]
    fn flat_layout_uses_bucket_zero() {
        assert_eq!(height_bucket(0.0, 0.0, 900), 0);
        assert_eq!(height_bucket(0.5, 1.0, 900), 450);
        assert_eq!(height_bucket(-1.0, 1.0, 900), -900);
        assert_eq!(height_bucket(f64::NAN, 1.0, 900), 0);

        let mut engine = engine();
        engine
            .registry_mut()
            .register(
                "FLAT",
                |i, o, _, _| Ok(Vector3::new(i, o, 0.0)),
                LayoutPreset::for_kind(PatternKind::SinCos),
            )
            .expect("register");
        let mut host = MemoryHost::new("FLAT");
        let report = completed(
            engine
                .run(&grid("FLAT", 3, 3), Trigger::Add, &mut host)
                .expect("run"),
        );
        assert_eq!(report.z_abs, 0.0);
        assert!(report
            .records
            .iter()
            .all(|r| unpack(r.color) == [255, 0, 0]));
    }

    #[test]
    fn passive_rerun_with_unchanged_configuration_is_skipped() {
        let mut engine = engine();
        let mut host = MemoryHost::new("SINCOS");
        let config = LayoutConfiguration::preset(PatternKind::SinCos).with_frame(3);
        completed(engine.run(&config, Trigger::Add, &mut host).expect("first"));

        let second = engine.run(&config, Trigger::Passive, &mut host).expect("second");
        assert_eq!(second, LayoutOutcome::Unchanged);

        // Explicit edits always run, even without changes.
        let third = completed(
            engine
                .run(&config, Trigger::ParameterEdit, &mut host)
                .expect("third"),
        );
        assert_eq!(third.records.len(), 900);

        // A passive refresh on a new frame runs again.
        let moved = engine
            .run(&config.clone().with_frame(4), Trigger::Passive, &mut host)
            .expect("fourth");
        assert!(matches!(moved, LayoutOutcome::Completed(_)));
    }

    #[test]
    fn passive_run_after_parameter_change_is_not_skipped() {
        let mut engine = engine();
        let mut host = MemoryHost::new("BOID");
        let config = grid("BOID", 3, 3);
        completed(engine.run(&config, Trigger::Add, &mut host).expect("first"));

        let mut edited = config.clone();
        edited.outer.radius = 9.0;
        assert!(engine.has_changed(&edited));
        let report = completed(engine.run(&edited, Trigger::Passive, &mut host).expect("edit"));
        assert_eq!(report.records.len(), 9);
        assert!(!engine.has_changed(&edited));
    }

    #[test]
    fn limited_existing_slots_truncate_to_whole_rows() {
        let mut engine = engine();
        let mut host = MemoryHost::new("BOID").with_existing_slots("Objects", 4, 10);
        let config = grid("BOID", 5, 5);
        let report = completed(
            engine
                .run(&config, Trigger::ParameterEdit, &mut host)
                .expect("run"),
        );

        assert_eq!(report.records.len(), 10);
        assert!(report.truncated);
        assert!(report.failures.is_empty(), "no 11th slot may be attempted");
        assert_eq!(report.records[9].slot_name, "Objects.0010");
        assert_eq!(report.records[9].outer_index, 1);
        assert_eq!(host.slots().len(), 10);
        // Progress percentages are relative to the full 25-slot plan.
        assert_eq!(host.progress().last(), Some(&(40.0, 10)));
    }

    #[test]
    fn moving_without_existing_slots_is_a_no_op() {
        let mut engine = engine();
        let mut host = MemoryHost::new("CLOUD");
        let outcome = engine
            .run(&LayoutConfiguration::default(), Trigger::ParameterEdit, &mut host)
            .expect("run");
        assert_eq!(outcome, LayoutOutcome::NoSlots);
        assert!(host.slots().is_empty());
    }

    #[test]
    fn invalid_configuration_aborts_before_placement() {
        let mut engine = engine();
        let mut host = MemoryHost::new("BOID");
        let mut config = grid("BOID", 5, 5);
        config.outer.step = 0.0;
        let err = engine
            .run(&config, Trigger::Add, &mut host)
            .expect_err("zero step");
        assert!(matches!(
            err,
            LayoutError::InvalidConfiguration {
                axis: AxisRole::Outer,
                ..
            }
        ));
        assert!(host.slots().is_empty());
        assert!(host.progress().is_empty());
        // The inner axis is not half-updated.
        assert_eq!(engine.inner().loop_count(), 30);
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn single_loop_axes_fail_for_trigonometric_patterns() {
        for pattern in ["CLOUD", "SINCOS", "BOID"] {
            let mut engine = engine();
            let mut host = MemoryHost::new(pattern);
            let err = engine
                .run(&grid(pattern, 1, 4), Trigger::Add, &mut host)
                .expect_err("degenerate inner axis");
            assert_eq!(
                err,
                LayoutError::DegenerateAxis {
                    axis: AxisRole::Inner
                }
            );
            let err = engine
                .run(&grid(pattern, 4, 1), Trigger::Add, &mut host)
                .expect_err("degenerate outer axis");
            assert_eq!(
                err,
                LayoutError::DegenerateAxis {
                    axis: AxisRole::Outer
                }
            );
            assert!(host.slots().is_empty());
            assert!(host.progress().is_empty(), "no progress for a failed pass");
        }

        let mut engine = engine();
        let mut host = MemoryHost::new("GAUSS");
        let report = completed(
            engine
                .run(&grid("GAUSS", 1, 4), Trigger::Add, &mut host)
                .expect("gauss does not use the linear map"),
        );
        assert_eq!(report.records.len(), 4);
    }

    #[test]
    fn settings_are_validated_on_construction() {
        let settings = EngineSettings {
            progress_interval: 0,
            ..EngineSettings::default()
        };
        let err = LayoutEngine::new(settings).expect_err("zero interval");
        assert!(matches!(err, LayoutError::InvalidSettings(ref reason) if reason.contains("progress_interval")));

        let settings = EngineSettings {
            scale_factor: f64::NAN,
            ..EngineSettings::default()
        };
        assert!(matches!(
            LayoutEngine::new(settings),
            Err(LayoutError::InvalidSettings(_))
        ));
    }

    #[test]
    fn oversized_loop_counts_are_rejected_before_allocation() {
        let mut engine = engine();
        let mut host = MemoryHost::new("BOID");
        let huge = AxisParams::new(u32::MAX, 1.0, 1.0, 1.0, 0.0);
        let config = LayoutConfiguration::new("BOID", huge, huge);
        let err = engine
            .run(&config, Trigger::Add, &mut host)
            .expect_err("too many loops");
        assert!(matches!(
            err,
            LayoutError::InvalidConfiguration {
                axis: AxisRole::Inner,
                ..
            }
        ));
        assert!(host.slots().is_empty());

        let report = completed(
            engine
                .run(&grid("BOID", 128, 2), Trigger::Add, &mut host)
                .expect("largest loop count runs"),
        );
        assert_eq!(report.records.len(), 256);
    }

    #[test]
    fn failing_slot_count_aborts_the_move() {
        let mut engine = engine();
        let mut host = MemoryHost::new("BOID").with_existing_slots("Objects", 4, 9);
        host.fail_counting("scene not loaded");
        let err = engine
            .run(&grid("BOID", 3, 3), Trigger::ParameterEdit, &mut host)
            .expect_err("count failure");
        assert_eq!(
            err,
            LayoutError::SlotCount(crate::error::HostError::new("scene not loaded"))
        );
        assert!(host.progress().is_empty());
        assert_eq!(host.slot("Objects.0001").map(|s| s.color), Some(0));
        assert_eq!(engine.state(), EngineState::Idle);

        // Creating does not ask the host for a count.
        let report = completed(
            engine
                .run(&grid("BOID", 3, 3), Trigger::Add, &mut host)
                .expect("add"),
        );
        assert_eq!(report.records.len(), 9);
    }

    #[test]
    fn unknown_pattern_is_rejected() {
        let mut engine = engine();
        let mut host = MemoryHost::new("SPIRAL");
        let err = engine
            .run(&grid("SPIRAL", 3, 3), Trigger::Add, &mut host)
            .expect_err("unknown");
        assert_eq!(err, LayoutError::UnknownPattern("SPIRAL".to_string()));
    }

    #[test]
    fn host_failures_are_collected_and_the_pass_continues() {
        let mut engine = engine();
        let mut host = MemoryHost::new("BOID");
        host.fail_on("Objects.0002");
        host.fail_on("Objects.0005");
        let report = completed(
            engine
                .run(&grid("BOID", 3, 2), Trigger::Add, &mut host)
                .expect("run"),
        );
        assert_eq!(report.records.len(), 6);
        let failed: Vec<&str> = report
            .failures
            .iter()
            .map(|f| f.slot_name.as_str())
            .collect();
        assert_eq!(failed, vec!["Objects.0002", "Objects.0005"]);
        assert_eq!(host.slots().len(), 4);
        assert!(host.slot("Objects.0006").is_some());
    }

    #[test]
    fn progress_is_reported_on_the_configured_cadence() {
        let settings = EngineSettings {
            progress_interval: 4,
            busy_policy: BusyPolicy::Reject,
            ..EngineSettings::default()
        };
        let mut engine = LayoutEngine::new(settings).expect("engine");
        let mut host = MemoryHost::new("BOID");
        completed(
            engine
                .run(&grid("BOID", 5, 2), Trigger::Add, &mut host)
                .expect("run"),
        );
        let done: Vec<usize> = host.progress().iter().map(|(_, done)| *done).collect();
        assert_eq!(done, vec![0, 4, 8, 10]);
        assert_eq!(host.progress().last().map(|(p, _)| *p), Some(100.0));
    }

    #[test]
    fn custom_settings_change_names_and_scale() {
        let settings = EngineSettings {
            slot_prefix: "Cube".to_string(),
            digits: 2,
            scale_factor: 1.0,
            ..EngineSettings::default()
        };
        let mut engine = LayoutEngine::new(settings).expect("engine");
        let mut host = MemoryHost::new("SINCOS");
        let report = completed(
            engine
                .run(&grid("SINCOS", 3, 3), Trigger::Add, &mut host)
                .expect("run"),
        );
        assert_eq!(report.records[4].slot_name, "Cube.05");
        assert_eq!(report.records[4].position.x, 1.0);
        assert_eq!(report.records[4].position.y, 1.0);
    }
}
