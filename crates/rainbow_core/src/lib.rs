pub mod axis;
pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod host;
pub mod naming;
pub mod pattern;
/// The `rainbow_core` crate lays out a grid of scene slots along two nested loops
/// and colors each slot by its height.
/// It has no scene dependency of its own: every side effect goes through a `SlotHost`.
///
/// Key components:
/// - **Axis**: `LoopRange` holds one loop's live parameters and its committed snapshot.
/// - **Patterns**: Cloud, SinCos, Gauss and Boid position functions, plus a registry for user patterns.
/// - **Color**: `RainbowColorMapper` quantizes a height bucket onto a 1536-step hue cycle.
/// - **Engine**: the two-pass layout (extent, then emit) and the non-blocking `LayoutDriver`.
pub mod traits;

pub use config::{BusyPolicy, EngineSettings, LayoutConfiguration, LayoutPreset};
pub use engine::{LayoutEngine, LayoutOutcome, LayoutReport, PlacementRecord, Trigger};
pub use error::{HostError, LayoutError, SlotFailure};
pub use gate::{EngineState, LayoutDriver};
