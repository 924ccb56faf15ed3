//! WASM bridge for `rainbow_core`.
//!
//! A JavaScript scene (for example a three.js viewer) passes itself as the
//! slot host; the engine calls back into it for every placed slot.

use wasm_bindgen::prelude::*;

mod chain;
mod host;

pub use chain::WasmRainbowChain;
pub use host::JsSlotHost;

/// Packed `red + green * 256 + blue * 65536` color of a height bucket.
#[wasm_bindgen]
pub fn rainbow_color(value: i32) -> u32 {
    rainbow_core::color::RainbowColorMapper::new().eval(value as i64)
}

/// Name of slot `index`; index 0 is the bare prefix.
#[wasm_bindgen]
pub fn slot_name(prefix: &str, digits: usize, index: usize) -> String {
    rainbow_core::naming::slot_name(prefix, digits, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exported_helpers_match_core() {
        assert_eq!(rainbow_color(0), 0x00_00_ff);
        assert_eq!(rainbow_color(512), 0x00_ff_00);
        assert_eq!(rainbow_color(-1536), rainbow_color(0));
        assert_eq!(slot_name("Objects", 4, 12), "Objects.0012");
        assert_eq!(slot_name("Objects", 4, 0), "Objects");
    }
}
