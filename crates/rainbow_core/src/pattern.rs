//! Built-in slot patterns and the pattern registry.
//!
//! Each pattern is a pure function of the two loop magnitudes and the two
//! axes (see [`PatternFn`]). Patterns return raw geometry; [`PatternRegistry::evaluate`]
//! applies the uniform scale factor.

use std::collections::BTreeMap;
use std::f64::consts::{PI, TAU};
use std::fmt;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::axis::LoopRange;
use crate::config::LayoutPreset;
use crate::error::LayoutError;
use crate::traits::PatternFn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    Cloud,
    #[serde(rename = "SINCOS")]
    SinCos,
    Gauss,
    Boid,
}

impl PatternKind {
    pub const ALL: [PatternKind; 4] = [
        PatternKind::Cloud,
        PatternKind::SinCos,
        PatternKind::Gauss,
        PatternKind::Boid,
    ];

    /// Registry id, e.g. `"CLOUD"`.
    pub fn id(self) -> &'static str {
        match self {
            PatternKind::Cloud => "CLOUD",
            PatternKind::SinCos => "SINCOS",
            PatternKind::Gauss => "GAUSS",
            PatternKind::Boid => "BOID",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PatternKind::Cloud => "Cloud",
            PatternKind::SinCos => "SinCos",
            PatternKind::Gauss => "Gauss",
            PatternKind::Boid => "Boid",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }

    pub fn function(self) -> PatternFn {
        match self {
            PatternKind::Cloud => cloud,
            PatternKind::SinCos => sin_cos,
            PatternKind::Gauss => gauss,
            PatternKind::Boid => boid,
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Angles shared by the trigonometric patterns.
struct LoopAngles {
    inner_angle: f64,
    outer_angle: f64,
    inner_value: f64,
    loop_angle: f64,
}

impl LoopAngles {
    fn new(
        inner_index: f64,
        outer_index: f64,
        inner: &LoopRange,
        outer: &LoopRange,
    ) -> Result<Self, LayoutError> {
        let inner_angle = TAU * inner_index / inner.range();
        let outer_angle = TAU * outer_index / outer.range();

        let inner_value = inner.linear_map(inner_index)?;
        let outer_value = outer.linear_map(outer_index)?;
        let loop_angle = TAU * (inner_value * outer_value) / (inner.max() * outer.max());

        Ok(Self {
            inner_angle,
            outer_angle,
            inner_value,
            loop_angle,
        })
    }
}

/// Circles around circles; height climbs with the inner loop.
pub fn cloud(
    inner_index: f64,
    outer_index: f64,
    inner: &LoopRange,
    outer: &LoopRange,
) -> Result<Vector3<f64>, LayoutError> {
    let angles = LoopAngles::new(inner_index, outer_index, inner, outer)?;

    let inner_phase = angles.inner_angle * inner.frequency();
    let loop_phase = angles.loop_angle * outer.frequency();
    let x = inner_phase.sin() * inner.radius() + loop_phase.sin() * outer.radius();
    let y = inner_phase.cos() * inner.radius() + loop_phase.cos() * outer.radius();
    // `%` keeps the sign of the dividend.
    let z = (angles.inner_value % (inner.max() + inner.step())) * inner.offset();

    Ok(Vector3::new(x, y, z))
}

/// Flat grid with a squared sine/cosine height field.
pub fn sin_cos(
    inner_index: f64,
    outer_index: f64,
    inner: &LoopRange,
    outer: &LoopRange,
) -> Result<Vector3<f64>, LayoutError> {
    // Only the plain angles feed the height; the loop angle is still evaluated
    // so single-loop axes are rejected the same way as for the other patterns.
    let angles = LoopAngles::new(inner_index, outer_index, inner, outer)?;

    let z = (angles.inner_angle * inner.frequency() + inner.offset())
        .sin()
        .powi(2)
        * inner.radius()
        + (angles.outer_angle * outer.frequency() + outer.offset())
            .cos()
            .powi(2)
            * outer.radius();

    Ok(Vector3::new(inner_index, outer_index, z))
}

/// Two Gaussian bumps, one per axis.
///
/// The mean comes from the inner axis frequency and the deviation from the
/// outer axis frequency, for both bumps.
pub fn gauss(
    inner_index: f64,
    outer_index: f64,
    inner: &LoopRange,
    outer: &LoopRange,
) -> Result<Vector3<f64>, LayoutError> {
    let x = inner_index + inner.offset();
    let y = outer_index + outer.offset();
    let mu = inner.frequency();
    let sigma = outer.frequency();

    let z = normal_density(x, mu, sigma) * inner.radius()
        + normal_density(y, mu, sigma) * outer.radius();

    Ok(Vector3::new(x, y, z))
}

fn normal_density(t: f64, mu: f64, sigma: f64) -> f64 {
    let a = (t - mu) / sigma;
    (-0.5 * a * a).exp() / (sigma * (2.0 * PI).sqrt())
}

/// Inverted paraboloid over a grid stretched by the radii.
pub fn boid(
    inner_index: f64,
    outer_index: f64,
    inner: &LoopRange,
    outer: &LoopRange,
) -> Result<Vector3<f64>, LayoutError> {
    LoopAngles::new(inner_index, outer_index, inner, outer)?;

    // Height is taken over the unstretched grid ...
    let x = inner_index;
    let y = outer_index;
    let z = -(inner.radius() * (x + inner.offset()).powi(2)
        + outer.radius() * (y + outer.offset()).powi(2));

    // ... while the returned x, y are stretched.
    let x = inner_index * inner.radius();
    let y = outer_index * outer.radius();

    Ok(Vector3::new(x, y, z))
}

/// A registered pattern: a built-in kind or a user function under its own id.
#[derive(Clone, Copy)]
pub enum Pattern {
    Builtin(PatternKind),
    Custom { function: PatternFn },
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Builtin(kind) => f.debug_tuple("Builtin").field(kind).finish(),
            Pattern::Custom { .. } => f.write_str("Custom"),
        }
    }
}

impl Pattern {
    pub fn function(&self) -> PatternFn {
        match self {
            Pattern::Builtin(kind) => kind.function(),
            Pattern::Custom { function } => *function,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatternEntry {
    pub pattern: Pattern,
    pub preset: LayoutPreset,
}

/// Pattern lookup by string id. Starts with the four built-ins.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    entries: BTreeMap<String, PatternEntry>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        let entries = PatternKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind.id().to_string(),
                    PatternEntry {
                        pattern: Pattern::Builtin(kind),
                        preset: LayoutPreset::for_kind(kind),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Adds a user pattern under a new id.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        function: PatternFn,
        preset: LayoutPreset,
    ) -> Result<(), LayoutError> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(LayoutError::DuplicatePattern(id));
        }
        self.entries.insert(
            id,
            PatternEntry {
                pattern: Pattern::Custom { function },
                preset,
            },
        );
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<&PatternEntry, LayoutError> {
        self.entries
            .get(id)
            .ok_or_else(|| LayoutError::UnknownPattern(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Evaluates pattern `id` and scales the result by `scale_factor`.
    pub fn evaluate(
        &self,
        id: &str,
        inner_index: f64,
        outer_index: f64,
        inner: &LoopRange,
        outer: &LoopRange,
        scale_factor: f64,
    ) -> Result<Vector3<f64>, LayoutError> {
        let function = self.get(id)?.pattern.function();
        Ok(function(inner_index, outer_index, inner, outer)? * scale_factor)
    }
}

impl Default for PatternRegistry {
    fn default() -> Self {
        Self::new()
    }
}
