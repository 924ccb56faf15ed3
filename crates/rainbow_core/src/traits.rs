use nalgebra::Vector3;

use crate::axis::LoopRange;
use crate::error::{HostError, LayoutError};

/// A pattern maps one (inner, outer) loop magnitude pair onto an unscaled 3D position.
/// inner_index / outer_index: loop magnitudes (`k * step`)
/// inner / outer: the two axes of the current pass
///
/// Any function with this signature can be registered as a pattern.
pub type PatternFn = fn(
    inner_index: f64,
    outer_index: f64,
    inner: &LoopRange,
    outer: &LoopRange,
) -> Result<Vector3<f64>, LayoutError>;

/// The scene side of a layout pass.
/// The engine never holds on to host objects; it only hands out names, positions and colors.
pub trait SlotHost {
    /// Creates the slot `name` (when `create_if_missing`) or moves and recolors an existing one.
    fn place_or_update_slot(
        &mut self,
        name: &str,
        position: Vector3<f64>,
        color: u32,
        create_if_missing: bool,
    ) -> Result<(), HostError>;

    /// Number of existing objects named `prefix` or `prefix.NNNN`.
    fn count_existing_slots(&self, prefix: &str) -> Result<usize, HostError>;

    /// Advisory progress callback.
    fn report_progress(&mut self, percent: f32, slots_done: usize) {
        log::info!("{percent:5.1}% drawn, {slots_done} objects");
    }

    fn current_frame(&self) -> i64;

    fn current_pattern_selection(&self) -> String;
}
