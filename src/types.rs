//! Shared data types for the patch distance engine.

use nalgebra::Matrix2;
use ndarray::Array2;

/// Samples strictly below this value mark a grid node that fell outside
/// valid image/mask coverage. Such nodes are excluded pairwise from both
/// distance accumulation and weight normalization.
pub const SAMPLE_UNKNOWN: f32 = -256.0;

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// One candidate canonical-grid sampling of a patch.
///
/// `samples` holds one row per channel, one column per grid node, produced
/// by interpolating the source image at each node position mapped through
/// `extra_transform * base_transform` into image space.
#[derive(Debug, Clone)]
pub struct NormalizedPatch {
    /// Channels × nodes sample matrix. Values below [`SAMPLE_UNKNOWN`]
    /// denote nodes without valid coverage.
    pub samples: Array2<f32>,
    /// Local affine transform of the point, from the structure tensor field.
    pub base_transform: Matrix2<f32>,
    /// Additional rotation chosen from the dominant orientation estimate.
    pub extra_transform: Matrix2<f32>,
}

impl NormalizedPatch {
    pub fn new(
        samples: Array2<f32>,
        base_transform: Matrix2<f32>,
        extra_transform: Matrix2<f32>,
    ) -> Self {
        Self {
            samples,
            base_transform,
            extra_transform,
        }
    }

    /// Composed transform mapping canonical-grid coordinates to image
    /// coordinates. Callers can reproduce the exact sampling geometry of
    /// this candidate without re-running orientation estimation.
    pub fn composed_transform(&self) -> Matrix2<f32> {
        self.extra_transform * self.base_transform
    }
}

/// Result record of a distance query.
///
/// A `distance` of `f32::MAX` means the two patches were incomparable
/// (no grid node was valid in both); it is a sentinel, not a measurement.
#[derive(Debug, Clone)]
pub struct DistanceInfo {
    pub distance: f32,
    pub source_point: Point,
    pub target_point: Point,
    /// Composed transform of the winning source candidate.
    pub source_transform: Matrix2<f32>,
    /// Composed transform of the winning target candidate.
    pub target_transform: Matrix2<f32>,
}
