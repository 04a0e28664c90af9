//! Cubic grid geometry and sampled values.

use darcflow_common::DarcError;
use serde::{Deserialize, Serialize};

use crate::emap::EmapHeader;
use crate::Result;

const TRUNCATION_SLACK: f64 = 1e-9;
const PREALLOC_LIMIT: usize = 1 << 20;

/// Axis-aligned cubic sampling: same point count and spacing on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub center: [f64; 3],
    pub spacing: f64,
    /// Points per axis
    pub points: usize,
}

impl GridGeometry {
    pub fn new(center: [f64; 3], spacing: f64, points: usize) -> Result<Self> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(DarcError::Config(format!("grid spacing must be positive, got {spacing}")));
        }
        if points == 0 {
            return Err(DarcError::Config("grid must have at least one point per axis".to_string()));
        }
        if points.checked_pow(3).is_none() {
            return Err(DarcError::Config(format!("{points} points per axis is too large a grid")));
        }
        Ok(Self { center, spacing, points })
    }

    /// Geometry of a cube of half-width `radius`: `(2 × radius) / spacing`
    /// points per axis, truncated the way AGD writers print `Dim` with `%d`.
    /// Ratios within 1e-9 below an integer count as that integer.
    pub fn from_radius(center: [f64; 3], radius: f64, spacing: f64) -> Result<Self> {
        if !(radius.is_finite() && radius > 0.0) {
            return Err(DarcError::Config(format!("grid radius must be positive, got {radius}")));
        }
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(DarcError::Config(format!("grid spacing must be positive, got {spacing}")));
        }
        let points = ((2.0 * radius) / spacing + TRUNCATION_SLACK).floor() as usize;
        Self::new(center, spacing, points)
    }

    /// Geometry declared by an AutoGrid map header.
    ///
    /// AutoGrid's `NELEMENTS n` counts intervals, so each axis holds `n + 1`
    /// samples.
    pub fn from_header(header: &EmapHeader) -> Result<Self> {
        let missing = |key: &str| DarcError::Config(format!("map header has no {key} line"));

        let center = header.center.ok_or_else(|| missing("CENTER"))?;
        let spacing = header.spacing.ok_or_else(|| missing("SPACING"))?;
        let [nx, ny, nz] = header.nelements.ok_or_else(|| missing("NELEMENTS"))?;
        if nx != ny || ny != nz {
            return Err(DarcError::Config(format!(
                "only cubic grids are supported, NELEMENTS is {nx} {ny} {nz}"
            )));
        }
        let points = nx
            .checked_add(1)
            .ok_or_else(|| DarcError::Config(format!("NELEMENTS {nx} is out of range")))?;
        Self::new(center, spacing, points)
    }

    /// Total number of samples, `points³`. Saturates for geometries built
    /// without [`GridGeometry::new`].
    pub fn len(&self) -> usize {
        self.points.saturating_pow(3)
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    /// Initial buffer size for reading samples. Headers are not trusted for
    /// more than this.
    pub(crate) fn capacity_hint(&self) -> usize {
        self.len().min(PREALLOC_LIMIT)
    }
}

/// A cubic grid together with its samples, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarGrid {
    geometry: GridGeometry,
    values: Vec<f64>,
}

impl ScalarGrid {
    /// Returns `None` unless `values` holds exactly `points³` samples.
    pub fn new(geometry: GridGeometry, values: Vec<f64>) -> Option<Self> {
        (values.len() == geometry.len()).then_some(Self { geometry, values })
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Smallest and largest sample.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
