#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Impact functions and their registry.
//!
//! An impact function maps a hazard intensity to the share of an exposed
//! value that is affected: the mean damage degree (`mdd`) times the
//! percentage of affected assets (`paf`), both linearly interpolated over an
//! ascending intensity grid and held constant beyond its ends.

use std::collections::BTreeMap;

use crop_risk_crop_models::HazardType;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors that can occur while building impact functions.
#[derive(Debug, thiserror::Error)]
pub enum ImpactFuncError {
    /// The curve arrays are unusable.
    #[error("Invalid impact function {haz_type}/{id}: {message}")]
    InvalidCurve {
        /// Hazard type of the function.
        haz_type: HazardType,
        /// Function id.
        id: u32,
        /// What is wrong with it.
        message: String,
    },
}

/// How a function's output relates to the exposed value.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResponseKind {
    /// Output is a damage fraction in `[0, 1]`.
    #[default]
    Fraction,
    /// Output is a signed relative change, e.g. a yield anomaly, and may
    /// leave `[0, 1]`.
    Relative,
}

/// One intensity-to-damage curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactFunction {
    haz_type: HazardType,
    id: u32,
    name: String,
    intensity_unit: String,
    intensity: Vec<f64>,
    mdd: Vec<f64>,
    paf: Vec<f64>,
    kind: ResponseKind,
}

impl ImpactFunction {
    /// Creates a validated function.
    ///
    /// # Errors
    ///
    /// Returns [`ImpactFuncError::InvalidCurve`] if there are fewer than two
    /// intensity points, the arrays differ in length, a value is not finite,
    /// or the intensity grid is not strictly ascending. `Fraction` functions
    /// must also keep `mdd` and `paf` within `[0, 1]`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        haz_type: HazardType,
        id: u32,
        name: impl Into<String>,
        intensity_unit: impl Into<String>,
        intensity: Vec<f64>,
        mdd: Vec<f64>,
        paf: Vec<f64>,
        kind: ResponseKind,
    ) -> Result<Self, ImpactFuncError> {
        let function = Self {
            haz_type,
            id,
            name: name.into(),
            intensity_unit: intensity_unit.into(),
            intensity,
            mdd,
            paf,
            kind,
        };
        function.check()?;
        Ok(function)
    }

    /// Relative crop yield function: the intensity is the relative yield
    /// anomaly and is passed through unchanged.
    #[must_use]
    pub fn relative_yield() -> Self {
        Self {
            haz_type: HazardType::RelativeCropyield,
            id: 1,
            name: "Relative crop yield".to_string(),
            intensity_unit: String::new(),
            intensity: vec![-1.0, 10.0],
            mdd: vec![-1.0, 10.0],
            paf: vec![1.0, 1.0],
            kind: ResponseKind::Relative,
        }
    }

    /// Default drought function: full damage below an SPI of -4, none above
    /// -1, linear in between.
    #[must_use]
    pub fn drought_default() -> Self {
        Self {
            haz_type: HazardType::Drought,
            id: 1,
            name: "Drought default".to_string(),
            intensity_unit: "SPI".to_string(),
            intensity: vec![-6.5, -4.0, -1.0, 0.0],
            mdd: vec![1.0, 1.0, 0.0, 0.0],
            paf: vec![1.0; 4],
            kind: ResponseKind::Fraction,
        }
    }

    /// Step drought function: full damage at an SPI below -1.
    #[must_use]
    pub fn drought_step() -> Self {
        Self {
            haz_type: HazardType::Drought,
            id: 1,
            name: "Drought step".to_string(),
            intensity_unit: "SPI".to_string(),
            intensity: vec![-6.5, -1.0001, -1.0, 0.0],
            mdd: vec![1.0, 1.0, 0.0, 0.0],
            paf: vec![1.0; 4],
            kind: ResponseKind::Fraction,
        }
    }

    /// Hazard type.
    #[must_use]
    pub const fn haz_type(&self) -> HazardType {
        self.haz_type
    }

    /// Id within the hazard type.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Human-readable name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unit of the intensity axis.
    #[must_use]
    pub fn intensity_unit(&self) -> &str {
        &self.intensity_unit
    }

    /// Response kind.
    #[must_use]
    pub const fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// Intensity grid.
    #[must_use]
    pub fn intensity(&self) -> &[f64] {
        &self.intensity
    }

    /// Mean damage degree at each grid point.
    #[must_use]
    pub fn mdd(&self) -> &[f64] {
        &self.mdd
    }

    /// Percentage of affected assets at each grid point.
    #[must_use]
    pub fn paf(&self) -> &[f64] {
        &self.paf
    }

    /// Sets the id, e.g. to register a variant next to the default.
    #[must_use]
    pub const fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }

    /// Response at one intensity: `mdd(x) * paf(x)`. `NaN` intensities
    /// give a response of `0`.
    #[must_use]
    pub fn evaluate(&self, intensity: f64) -> f64 {
        if intensity.is_nan() {
            return 0.0;
        }
        interpolate(&self.intensity, &self.mdd, intensity)
            * interpolate(&self.intensity, &self.paf, intensity)
    }

    /// Validates the curve arrays.
    ///
    /// # Errors
    ///
    /// See [`ImpactFunction::new`].
    pub fn check(&self) -> Result<(), ImpactFuncError> {
        let invalid = |message: String| ImpactFuncError::InvalidCurve {
            haz_type: self.haz_type,
            id: self.id,
            message,
        };

        if self.intensity.len() < 2 {
            return Err(invalid(format!(
                "{} intensity points, need at least 2",
                self.intensity.len()
            )));
        }
        if self.mdd.len() != self.intensity.len() || self.paf.len() != self.intensity.len() {
            return Err(invalid(format!(
                "{} intensities, {} mdd, {} paf values",
                self.intensity.len(),
                self.mdd.len(),
                self.paf.len()
            )));
        }
        if let Some(v) = self
            .intensity
            .iter()
            .chain(&self.mdd)
            .chain(&self.paf)
            .find(|v| !v.is_finite())
        {
            return Err(invalid(format!("non-finite value {v}")));
        }
        if self.intensity.windows(2).any(|w| w[1] <= w[0]) {
            return Err(invalid("intensity grid is not strictly ascending".to_string()));
        }
        if self.kind == ResponseKind::Fraction
            && let Some(v) = self
                .mdd
                .iter()
                .chain(&self.paf)
                .find(|v| !(0.0..=1.0).contains(*v))
        {
            return Err(invalid(format!("fraction {v} outside [0, 1]")));
        }
        Ok(())
    }
}

/// Piecewise linear interpolation of `ys` over ascending `xs`, constant
/// beyond either end.
#[allow(clippy::float_cmp)]
fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    // First grid point strictly greater than x, so x0 <= x < x1.
    let upper = xs.partition_point(|&v| v <= x);
    let (x0, x1) = (xs[upper - 1], xs[upper]);
    let (y0, y1) = (ys[upper - 1], ys[upper]);
    // Identity segments return the intensity unchanged, without rounding.
    if y0 == x0 && y1 == x1 {
        return x;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Impact functions keyed by hazard type and id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImpactFuncSet {
    functions: BTreeMap<(HazardType, u32), ImpactFunction>,
}

impl ImpactFuncSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    /// Set holding the relative crop yield function.
    #[must_use]
    pub fn relative_yield() -> Self {
        let mut set = Self::new();
        set.push(ImpactFunction::relative_yield());
        set
    }

    /// Set holding the default drought function.
    #[must_use]
    pub fn drought() -> Self {
        let mut set = Self::new();
        set.push(ImpactFunction::drought_default());
        set
    }

    /// Adds a function, replacing any with the same hazard type and id.
    pub fn push(&mut self, function: ImpactFunction) {
        let key = (function.haz_type(), function.id());
        if self.functions.insert(key, function).is_some() {
            log::debug!("Replaced impact function {}/{}", key.0, key.1);
        }
    }

    /// Looks up one function.
    #[must_use]
    pub fn get(&self, haz_type: HazardType, id: u32) -> Option<&ImpactFunction> {
        self.functions.get(&(haz_type, id))
    }

    /// Ids registered for a hazard type, ascending.
    #[must_use]
    pub fn ids(&self, haz_type: HazardType) -> Vec<u32> {
        self.functions
            .keys()
            .filter(|(h, _)| *h == haz_type)
            .map(|&(_, id)| id)
            .collect()
    }

    /// Number of registered functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// All functions in key order.
    pub fn iter(&self) -> impl Iterator<Item = &ImpactFunction> {
        self.functions.values()
    }

    /// Validates every function.
    ///
    /// # Errors
    ///
    /// Returns the first [`ImpactFuncError`] found.
    pub fn check(&self) -> Result<(), ImpactFuncError> {
        self.functions.values().try_for_each(ImpactFunction::check)
    }
}
