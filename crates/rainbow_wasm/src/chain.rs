//! WASM-exported layout driver.

use rainbow_core::config::{EngineSettings, LayoutConfiguration};
use rainbow_core::engine::{LayoutEngine, LayoutOutcome, Trigger};
use rainbow_core::error::LayoutError;
use rainbow_core::gate::{EngineState, LayoutDriver};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

use crate::host::JsSlotHost;

/// One Rainbow Chains array bound to a JS scene.
///
/// Every method takes `&self`, so host callbacks may call back in while a pass
/// is placing slots; such calls are dropped or queued per the busy policy.
#[wasm_bindgen]
pub struct WasmRainbowChain {
    driver: LayoutDriver,
}

#[wasm_bindgen]
impl WasmRainbowChain {
    /// `settings_val` may be `undefined` for the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(settings_val: JsValue) -> Result<WasmRainbowChain, JsValue> {
        #[cfg(target_arch = "wasm32")]
        console_error_panic_hook::set_once();

        let settings =
            parse_settings(settings_val).map_err(|e| JsValue::from_str(&format!("{e:#}")))?;
        let engine = LayoutEngine::new(settings).map_err(layout_error)?;
        Ok(WasmRainbowChain {
            driver: LayoutDriver::new(engine),
        })
    }

    /// Moves existing slots to the layout described by `config_val`.
    pub fn draw(&self, config_val: JsValue, host: JsValue) -> Result<JsValue, JsValue> {
        self.invoke(config_val, "parameter_edit", host)
    }

    /// Creates (or moves) every slot of the layout.
    pub fn add(&self, config_val: JsValue, host: JsValue) -> Result<JsValue, JsValue> {
        self.invoke(config_val, "add", host)
    }

    /// Runs a pass for an explicit trigger name: `passive`, `parameter_edit` or `add`.
    pub fn invoke(
        &self,
        config_val: JsValue,
        trigger: &str,
        host: JsValue,
    ) -> Result<JsValue, JsValue> {
        let trigger = parse_trigger(trigger).map_err(|e| JsValue::from_str(&e))?;
        let config: LayoutConfiguration = from_value(config_val)
            .map_err(|e| JsValue::from_str(&format!("Invalid layout configuration: {}", e)))?;
        let mut host = JsSlotHost::new(host)?;
        let outcome = self
            .driver
            .invoke(config, trigger, &mut host)
            .map_err(layout_error)?;
        outcome_value(&outcome)
    }

    /// Resets both axes to the preset of pattern `id` and redraws.
    pub fn select_pattern(&self, id: &str, host: JsValue) -> Result<JsValue, JsValue> {
        let mut host = JsSlotHost::new(host)?;
        let outcome = self
            .driver
            .select_pattern(id, &mut host)
            .map_err(layout_error)?;
        outcome_value(&outcome)
    }

    /// Frame-change refresh; a no-op when nothing changed.
    pub fn tick(&self, host: JsValue) -> Result<JsValue, JsValue> {
        let mut host = JsSlotHost::new(host)?;
        let outcome = self.driver.tick(&mut host).map_err(layout_error)?;
        outcome_value(&outcome)
    }

    /// Preset configuration of pattern `id`, for filling a parameter panel.
    pub fn preset(&self, id: &str) -> Result<JsValue, JsValue> {
        if self.driver.state() != EngineState::Idle {
            return Err(JsValue::from_str("Layout pass in progress."));
        }
        let config = self.driver.preset_config(id).map_err(layout_error)?;
        to_value(&config).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Registered pattern ids in sorted order.
    pub fn pattern_ids(&self) -> Result<Vec<String>, JsValue> {
        if self.driver.state() != EngineState::Idle {
            return Err(JsValue::from_str("Layout pass in progress."));
        }
        Ok(self
            .driver
            .engine()
            .registry()
            .ids()
            .map(str::to_string)
            .collect())
    }

    pub fn is_busy(&self) -> bool {
        self.driver.state() != EngineState::Idle
    }
}

fn parse_settings(value: JsValue) -> anyhow::Result<EngineSettings> {
    if value.is_undefined() || value.is_null() {
        return Ok(EngineSettings::default());
    }
    let settings: EngineSettings =
        from_value(value).map_err(|e| anyhow::anyhow!("Invalid engine settings: {e}"))?;
    settings.validate()?;
    Ok(settings)
}

pub(crate) fn parse_trigger(name: &str) -> Result<Trigger, String> {
    match name {
        "passive" => Ok(Trigger::Passive),
        "parameter_edit" => Ok(Trigger::ParameterEdit),
        "add" => Ok(Trigger::Add),
        other => Err(format!("Unknown trigger: {}", other)),
    }
}

fn layout_error(err: LayoutError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn outcome_value(outcome: &LayoutOutcome) -> Result<JsValue, JsValue> {
    to_value(outcome).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_names_parse() {
        assert_eq!(parse_trigger("passive"), Ok(Trigger::Passive));
        assert_eq!(parse_trigger("parameter_edit"), Ok(Trigger::ParameterEdit));
        assert_eq!(parse_trigger("add"), Ok(Trigger::Add));
        let err = parse_trigger("redraw").expect_err("unknown trigger");
        assert!(err.contains("redraw"));
    }
}
