//! Reentrancy guard and the host-facing entry points.
//!
//! Hosts call into the engine from property-change callbacks, explicit draw
//! actions and frame ticks, and a callback may fire while a pass is still
//! placing slots. `LayoutGate` makes the busy state explicit without blocking;
//! `LayoutDriver` decides whether a colliding call is dropped or replayed.

use std::cell::{Cell, Ref, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::{BusyPolicy, LayoutConfiguration};
use crate::engine::{LayoutEngine, LayoutOutcome, Trigger};
use crate::error::LayoutError;
use crate::traits::SlotHost;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineState {
    #[default]
    Idle,
    Computing,
    Placing,
}

/// Single-threaded busy flag with explicit pass phases.
#[derive(Debug, Default)]
pub struct LayoutGate {
    state: Cell<EngineState>,
}

impl LayoutGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    pub fn is_busy(&self) -> bool {
        self.state.get() != EngineState::Idle
    }

    /// Moves `Idle -> Computing`. Returns `None` while another pass holds the gate.
    pub fn try_begin(&self) -> Option<GateTicket<'_>> {
        if self.is_busy() {
            return None;
        }
        self.state.set(EngineState::Computing);
        Some(GateTicket { gate: self })
    }
}

/// Held for the duration of one pass; releases the gate on drop, including
/// when the pass returns early with an error.
#[derive(Debug)]
pub struct GateTicket<'a> {
    gate: &'a LayoutGate,
}

impl GateTicket<'_> {
    /// `Computing -> Placing`.
    pub fn enter_placing(&self) {
        self.gate.state.set(EngineState::Placing);
    }
}

impl Drop for GateTicket<'_> {
    fn drop(&mut self) {
        self.gate.state.set(EngineState::Idle);
    }
}

#[derive(Debug, Clone)]
struct PendingPass {
    config: LayoutConfiguration,
    trigger: Trigger,
}

/// Shared handle to an engine that host callbacks may re-enter.
///
/// All methods take `&self`; a call that arrives while a pass is running never
/// touches the engine. Depending on [`BusyPolicy`] it is dropped or queued,
/// and a queued call is replayed (latest configuration wins) once the running
/// pass has finished.
#[derive(Debug)]
pub struct LayoutDriver {
    gate: Rc<LayoutGate>,
    policy: BusyPolicy,
    engine: RefCell<LayoutEngine>,
    pending: RefCell<Option<PendingPass>>,
    last_config: RefCell<Option<LayoutConfiguration>>,
}

impl LayoutDriver {
    pub fn new(engine: LayoutEngine) -> Self {
        Self {
            gate: engine.gate(),
            policy: engine.settings().busy_policy,
            engine: RefCell::new(engine),
            pending: RefCell::new(None),
            last_config: RefCell::new(None),
        }
    }

    pub fn state(&self) -> EngineState {
        self.gate.state()
    }

    pub fn engine(&self) -> Ref<'_, LayoutEngine> {
        self.engine.borrow()
    }

    pub fn last_config(&self) -> Option<LayoutConfiguration> {
        self.last_config.borrow().clone()
    }

    /// Explicit redraw after a parameter edit: moves existing slots only.
    pub fn draw<H: SlotHost + ?Sized>(
        &self,
        config: LayoutConfiguration,
        host: &mut H,
    ) -> Result<LayoutOutcome, LayoutError> {
        self.invoke(config, Trigger::ParameterEdit, host)
    }

    /// Explicit "add" request: creates missing slots.
    pub fn add<H: SlotHost + ?Sized>(
        &self,
        config: LayoutConfiguration,
        host: &mut H,
    ) -> Result<LayoutOutcome, LayoutError> {
        self.invoke(config, Trigger::Add, host)
    }

    /// Switches to pattern `id`, resetting both axes to its preset.
    pub fn select_pattern<H: SlotHost + ?Sized>(
        &self,
        id: &str,
        host: &mut H,
    ) -> Result<LayoutOutcome, LayoutError> {
        if self.gate.is_busy() {
            return Ok(self.drop_host_request("pattern selection"));
        }
        let config = self
            .preset_config(id)?
            .with_frame(host.current_frame());
        self.invoke(config, Trigger::ParameterEdit, host)
    }

    /// Passive refresh on a host frame change. Re-reads frame and pattern
    /// selection from the host and skips the pass when nothing changed.
    pub fn tick<H: SlotHost + ?Sized>(&self, host: &mut H) -> Result<LayoutOutcome, LayoutError> {
        if self.gate.is_busy() {
            return Ok(self.drop_host_request("frame tick"));
        }
        let selection = host.current_pattern_selection();
        let config = match self.last_config() {
            Some(mut config) if config.pattern == selection => {
                config.refresh_from_host(&*host);
                config
            }
            _ => self
                .preset_config(&selection)?
                .with_frame(host.current_frame()),
        };
        self.invoke(config, Trigger::Passive, host)
    }

    /// Preset configuration of pattern `id`. Must not be called from inside a running pass.
    pub fn preset_config(&self, id: &str) -> Result<LayoutConfiguration, LayoutError> {
        let preset = self.engine.borrow().registry().get(id)?.preset;
        Ok(LayoutConfiguration::from_preset(id, preset))
    }

    /// Selections and ticks carry no configuration of their own to queue;
    /// the next explicit pass or tick picks up the host state instead.
    fn drop_host_request(&self, what: &str) -> LayoutOutcome {
        log::warn!(
            "Layout pass in progress ({:?}); dropping {what}",
            self.gate.state()
        );
        LayoutOutcome::Busy { queued: false }
    }

    pub fn invoke<H: SlotHost + ?Sized>(
        &self,
        config: LayoutConfiguration,
        trigger: Trigger,
        host: &mut H,
    ) -> Result<LayoutOutcome, LayoutError> {
        if self.gate.is_busy() {
            return Ok(self.defer(config, trigger));
        }

        let mut outcome = self.run_now(config, trigger, host)?;
        loop {
            let next = self.pending.borrow_mut().take();
            let Some(pending) = next else {
                break;
            };
            log::info!(
                "Replaying queued {:?} layout for pattern {}",
                pending.trigger,
                pending.config.pattern
            );
            outcome = self.run_now(pending.config, pending.trigger, host)?;
        }
        Ok(outcome)
    }

    fn run_now<H: SlotHost + ?Sized>(
        &self,
        config: LayoutConfiguration,
        trigger: Trigger,
        host: &mut H,
    ) -> Result<LayoutOutcome, LayoutError> {
        let outcome = self.engine.borrow_mut().run(&config, trigger, host)?;
        *self.last_config.borrow_mut() = Some(config);
        Ok(outcome)
    }

    fn defer(&self, config: LayoutConfiguration, trigger: Trigger) -> LayoutOutcome {
        match self.policy {
            BusyPolicy::Reject => {
                log::warn!(
                    "Layout pass in progress ({:?}); rejecting {trigger:?} request",
                    self.gate.state()
                );
                LayoutOutcome::Busy { queued: false }
            }
            BusyPolicy::QueueRetry => {
                let mut pending = self.pending.borrow_mut();
                // Keep the strongest trigger so a queued "add" is not downgraded.
                let trigger = pending
                    .as_ref()
                    .map_or(trigger, |queued| queued.trigger.max(trigger));
                log::warn!(
                    "Layout pass in progress ({:?}); queueing {trigger:?} request",
                    self.gate.state()
                );
                *pending = Some(PendingPass { config, trigger });
                LayoutOutcome::Busy { queued: true }
            }
        }
    }
}
