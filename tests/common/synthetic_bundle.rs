//! Synthetic bundle and normalizer fixtures for integration tests.

use nalgebra::{Matrix2, Vector2};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

use affsim::{GridInfo, PatchCache, PatchNormalizer, Point, TensorBundle};

/// Fill value for grid nodes without valid coverage; safely below the
/// unknown threshold.
pub const UNKNOWN_FILL: f32 = -1000.0;

/// Test normalizer: square-lattice grid clipped to the unit disc,
/// mean-gradient orientation estimation, nearest-neighbor grid sampling.
pub struct DiscNormalizer;

impl PatchNormalizer for DiscNormalizer {
    fn create_regular_grid(&self, resolution: u32) -> GridInfo {
        let n = resolution.max(2) as usize;
        let mut nodes = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let x = -1.0 + 2.0 * i as f32 / (n - 1) as f32;
                let y = -1.0 + 2.0 * j as f32 / (n - 1) as f32;
                if x * x + y * y <= 1.0 + 1e-6 {
                    nodes.push(Vector2::new(x, y));
                }
            }
        }
        GridInfo::new(nodes)
    }

    fn dominant_orientations(
        &self,
        gradient_x: ArrayView2<'_, f32>,
        gradient_y: ArrayView2<'_, f32>,
        region: &[Point],
        _transform: &Matrix2<f32>,
        _point: Point,
    ) -> Vec<f32> {
        let mut sum_x = 0.0f32;
        let mut sum_y = 0.0f32;
        for p in region {
            sum_x += gradient_x[[p.y as usize, p.x as usize]];
            sum_y += gradient_y[[p.y as usize, p.x as usize]];
        }
        if sum_x * sum_x + sum_y * sum_y < 1e-9 {
            vec![0.0]
        } else {
            let angle = sum_y.atan2(sum_x);
            vec![angle, angle + std::f32::consts::PI]
        }
    }

    fn interpolate_to_grid(
        &self,
        grid: &GridInfo,
        image: ArrayView3<'_, f32>,
        mask: ArrayView2<'_, u8>,
        transform: &Matrix2<f32>,
        point: Point,
    ) -> Array2<f32> {
        let channels = image.shape()[0];
        let height = image.shape()[1] as i32;
        let width = image.shape()[2] as i32;

        let mut samples = Array2::from_elem((channels, grid.len()), UNKNOWN_FILL);
        for (k, node) in grid.nodes().iter().enumerate() {
            let offset = transform * node;
            let x = (point.x as f32 + offset.x).round() as i32;
            let y = (point.y as f32 + offset.y).round() as i32;
            if x < 0 || y < 0 || x >= width || y >= height {
                continue;
            }
            if mask[[y as usize, x as usize]] == 0 {
                continue;
            }
            for ch in 0..channels {
                samples[[ch, k]] = image[[ch, y as usize, x as usize]];
            }
        }
        samples
    }
}

/// Image bundle over in-memory arrays with a constant per-point transform
/// (identity scaled by the patch radius, as produced by a flat structure
/// tensor field).
pub struct SyntheticBundle {
    image: Array3<f32>,
    gradient_x: Array2<f32>,
    gradient_y: Array2<f32>,
    mask: Array2<u8>,
    transform: Matrix2<f32>,
    radius: f32,
    cache: Option<PatchCache>,
}

impl SyntheticBundle {
    pub fn new(image: Array3<f32>, radius: f32) -> Self {
        let (height, width) = (image.shape()[1], image.shape()[2]);
        Self {
            image,
            gradient_x: Array2::zeros((height, width)),
            gradient_y: Array2::zeros((height, width)),
            mask: Array2::ones((height, width)),
            transform: Matrix2::identity() * radius,
            radius,
            cache: Some(PatchCache::new(width, height)),
        }
    }

    /// Single-channel constant image.
    pub fn constant(width: usize, height: usize, value: f32, radius: f32) -> Self {
        Self::new(Array3::from_elem((1, height, width), value), radius)
    }

    pub fn with_gradients(mut self, gradient_x: Array2<f32>, gradient_y: Array2<f32>) -> Self {
        self.gradient_x = gradient_x;
        self.gradient_y = gradient_y;
        self
    }

    pub fn with_mask(mut self, mask: Array2<u8>) -> Self {
        self.mask = mask;
        self
    }

    pub fn cache_slots(&self) -> &PatchCache {
        self.cache.as_ref().expect("bundle built with a cache")
    }
}

impl TensorBundle for SyntheticBundle {
    fn number_of_channels(&self) -> usize {
        self.image.shape()[0]
    }

    fn size_x(&self) -> usize {
        self.image.shape()[2]
    }

    fn size_y(&self) -> usize {
        self.image.shape()[1]
    }

    fn image(&self) -> ArrayView3<'_, f32> {
        self.image.view()
    }

    fn gradient_x(&self) -> ArrayView2<'_, f32> {
        self.gradient_x.view()
    }

    fn gradient_y(&self) -> ArrayView2<'_, f32> {
        self.gradient_y.view()
    }

    fn mask(&self) -> ArrayView2<'_, u8> {
        self.mask.view()
    }

    fn region(&self, point: Point) -> Vec<Point> {
        let r = self.radius.ceil() as i32;
        let (width, height) = (self.size_x() as i32, self.size_y() as i32);
        let mut points = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let x = point.x + dx;
                let y = point.y + dy;
                if x < 0 || y < 0 || x >= width || y >= height {
                    continue;
                }
                points.push(Point::new(x, y));
            }
        }
        points
    }

    fn transform(&self, _point: Point) -> Matrix2<f32> {
        self.transform
    }

    fn radius(&self) -> f32 {
        self.radius
    }

    fn patch_cache(&self) -> Option<&PatchCache> {
        self.cache.as_ref()
    }
}
