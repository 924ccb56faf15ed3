//! `SlotHost` backed by a JavaScript scene object.

use js_sys::{Array, Function, Reflect};
use nalgebra::Vector3;
use rainbow_core::error::HostError;
use rainbow_core::traits::SlotHost;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Wraps a JS object exposing `placeOrUpdateSlot(name, [x, y, z], color, create)`,
/// `countExistingSlots(prefix)`, `reportProgress(percent, done)`,
/// `currentFrame()` and `currentPatternSelection()`.
///
/// `reportProgress` is optional; without it progress goes to the `log` facade.
pub struct JsSlotHost {
    object: JsValue,
}

impl JsSlotHost {
    pub fn new(object: JsValue) -> Result<Self, JsValue> {
        if !object.is_object() {
            return Err(JsValue::from_str("Slot host must be an object."));
        }
        Ok(Self { object })
    }

    fn method(&self, name: &str) -> Result<Function, HostError> {
        let value = Reflect::get(&self.object, &JsValue::from_str(name))
            .map_err(|e| js_error(&format!("Cannot read {name}"), &e))?;
        value
            .dyn_into::<Function>()
            .map_err(|_| HostError::new(format!("Slot host has no {name}() method")))
    }

    fn call(&self, name: &str, args: &Array) -> Result<JsValue, HostError> {
        self.method(name)?
            .apply(&self.object, args)
            .map_err(|e| js_error(&format!("{name}() failed"), &e))
    }
}

fn js_error(context: &str, error: &JsValue) -> HostError {
    let detail = error
        .as_string()
        .or_else(|| {
            error
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{error:?}"));
    HostError::new(format!("{context}: {detail}"))
}

impl SlotHost for JsSlotHost {
    fn place_or_update_slot(
        &mut self,
        name: &str,
        position: Vector3<f64>,
        color: u32,
        create_if_missing: bool,
    ) -> Result<(), HostError> {
        let coords = Array::of3(
            &JsValue::from_f64(position.x),
            &JsValue::from_f64(position.y),
            &JsValue::from_f64(position.z),
        );
        let args = Array::of4(
            &JsValue::from_str(name),
            &coords,
            &JsValue::from_f64(color as f64),
            &JsValue::from_bool(create_if_missing),
        );
        self.call("placeOrUpdateSlot", &args)?;
        Ok(())
    }

    fn count_existing_slots(&self, prefix: &str) -> Result<usize, HostError> {
        let count = self.call("countExistingSlots", &Array::of1(&JsValue::from_str(prefix)))?;
        match count.as_f64() {
            Some(n) if n.is_finite() && n >= 0.0 => Ok(n as usize),
            _ => Err(HostError::new(format!(
                "countExistingSlots() returned {count:?}, expected a non-negative number"
            ))),
        }
    }

    fn report_progress(&mut self, percent: f32, slots_done: usize) {
        if self.method("reportProgress").is_err() {
            log::info!("{percent:5.1}% drawn, {slots_done} objects");
            return;
        }
        let args = Array::of2(
            &JsValue::from_f64(percent as f64),
            &JsValue::from_f64(slots_done as f64),
        );
        if let Err(err) = self.call("reportProgress", &args) {
            log::warn!("{err}");
        }
    }

    fn current_frame(&self) -> i64 {
        match self.call("currentFrame", &Array::new()) {
            Ok(frame) => frame.as_f64().map_or(0, |f| f as i64),
            Err(err) => {
                log::warn!("{err}; using frame 0");
                0
            }
        }
    }

    fn current_pattern_selection(&self) -> String {
        match self.call("currentPatternSelection", &Array::new()) {
            Ok(selection) => selection.as_string().unwrap_or_default(),
            Err(err) => {
                log::warn!("{err}");
                String::new()
            }
        }
    }
}
