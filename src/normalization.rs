//! Canonical grid representation and the normalization collaborator seam.
//!
//! The engine compares patches on a fixed regular grid spanning the unit
//! disc; building that grid, estimating dominant orientations and
//! interpolating image samples onto the grid are supplied by an external
//! normalization collaborator through the [`PatchNormalizer`] trait.

use nalgebra::{Matrix2, Vector2};
use ndarray::{Array2, ArrayView2, ArrayView3};

use crate::types::Point;

/// Immutable regular sampling grid over the unit disc.
///
/// Rebuilt wholesale (behind an `Arc`) whenever the resolution changes;
/// never mutated in place, so in-flight readers keep a consistent view.
#[derive(Debug, Clone)]
pub struct GridInfo {
    nodes: Vec<Vector2<f32>>,
}

impl GridInfo {
    pub fn new(nodes: Vec<Vector2<f32>>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Vector2<f32>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index of the node taken as the patch center by the geodesic scorer.
    pub fn center_index(&self) -> usize {
        self.nodes.len() / 2
    }
}

/// Contract of the ellipse-normalization collaborator.
///
/// Implementations must be cheap to call from multiple threads; the engine
/// invokes them concurrently during parallel precompute.
pub trait PatchNormalizer: Sync {
    /// Build the regular grid for a given resolution. Node coordinates lie
    /// within the unit disc.
    fn create_regular_grid(&self, resolution: u32) -> GridInfo;

    /// Estimate an ordered sequence of dominant orientation angles (radians)
    /// from the local gradient field within `region`, under the local
    /// affine `transform` around `point`. May be empty.
    fn dominant_orientations(
        &self,
        gradient_x: ArrayView2<'_, f32>,
        gradient_y: ArrayView2<'_, f32>,
        region: &[Point],
        transform: &Matrix2<f32>,
        point: Point,
    ) -> Vec<f32>;

    /// Rotation matrix for the given angle (radians).
    fn rotation(&self, angle: f32) -> Matrix2<f32> {
        let (sin, cos) = angle.sin_cos();
        Matrix2::new(cos, -sin, sin, cos)
    }

    /// Sample `image` onto the grid nodes mapped through `transform` around
    /// `point`. Returns a channels × nodes matrix; nodes without valid
    /// coverage (outside the image or masked out) must carry values below
    /// [`crate::SAMPLE_UNKNOWN`].
    fn interpolate_to_grid(
        &self,
        grid: &GridInfo,
        image: ArrayView3<'_, f32>,
        mask: ArrayView2<'_, u8>,
        transform: &Matrix2<f32>,
        point: Point,
    ) -> Array2<f32>;
}
