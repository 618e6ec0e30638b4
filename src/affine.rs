//! Affine-invariant patch distance driven by dominant orientations.
//!
//! For every query point the engine builds a set of candidate
//! normalizations (one per dominant orientation, as in keypoint orientation
//! assignment), optionally cached per pixel inside the bundle, and returns
//! the minimum grid-scorer distance over the full candidate cross product.

use std::ops::Deref;
use std::sync::Arc;

use log::debug;
use nalgebra::Matrix2;
use rayon::prelude::*;

use crate::bundle::TensorBundle;
use crate::normalization::{GridInfo, PatchNormalizer};
use crate::scoring::GridScorer;
use crate::types::{DistanceInfo, NormalizedPatch, Point};

/// Capability interface of a patch distance calculator.
pub trait PatchDistance<B: TensorBundle> {
    /// Compute the patch distance between two points of interest. The two
    /// bundles may coincide. All failure modes surface as the `f32::MAX`
    /// sentinel distance, never as a panic or an error value.
    fn calculate(
        &self,
        source_bundle: &B,
        source_point: Point,
        target_bundle: &B,
        target_point: Point,
    ) -> DistanceInfo;
}

/// Candidate list borrowed from a bundle cache or computed transiently for
/// a single query.
enum Candidates<'a> {
    Cached(&'a [NormalizedPatch]),
    Transient(Vec<NormalizedPatch>),
}

impl Deref for Candidates<'_> {
    type Target = [NormalizedPatch];

    fn deref(&self) -> &[NormalizedPatch] {
        match self {
            Candidates::Cached(slice) => slice,
            Candidates::Transient(list) => list,
        }
    }
}

/// Affine-invariant patch distance calculator over a regular grid.
///
/// Persistent state is limited to the (grid, weights) pair owned by the
/// embedded scorer; queries are `&self` and reentrant. Parameter setters
/// take `&mut self` and are meant for configuration time, not for use
/// concurrently with in-flight queries.
pub struct AffinePatchDistance<N: PatchNormalizer> {
    normalization: N,
    scorer: GridScorer,
    use_cache: bool,
}

impl<N: PatchNormalizer> AffinePatchDistance<N> {
    pub fn new(grid_size: u32, normalization: N) -> Self {
        let grid = normalization.create_regular_grid(grid_size);
        Self {
            normalization,
            scorer: GridScorer::new(grid, grid_size),
            use_cache: true,
        }
    }

    /// Regular grid used in distance computation.
    pub fn grid(&self) -> Arc<GridInfo> {
        self.scorer.grid()
    }

    /// Number of nodes in a normalized patch.
    pub fn normalized_patch_length(&self) -> usize {
        self.scorer.grid().len()
    }

    pub fn grid_size(&self) -> u32 {
        self.scorer.grid_size()
    }

    /// Set the grid resolution. Rebuilds the grid and the weight table
    /// when the value actually changes.
    pub fn set_grid_size(&mut self, value: u32) {
        if self.scorer.grid_size() != value {
            debug!("rebuilding canonical grid at resolution {}", value);
            let grid = self.normalization.create_regular_grid(value);
            self.scorer.replace_grid(grid, value);
        }
    }

    pub fn scale(&self) -> f32 {
        self.scorer.scale()
    }

    /// Set the relative spread of the Gaussian weights w.r.t. the patch
    /// radius. Regenerates the weight table.
    pub fn set_scale(&mut self, value: f32) {
        self.scorer.set_scale(value);
    }

    pub fn bilateral_k_color(&self) -> f32 {
        self.scorer.bilateral_k_color()
    }

    /// Set kappa-color for bilateral weights. Bilateral (geodesic) scoring
    /// is active while the magnitude stays above a small threshold.
    pub fn set_bilateral_k_color(&mut self, value: f32) {
        self.scorer.set_bilateral_k_color(value);
    }

    pub fn bilateral_k_spatial(&self) -> f32 {
        self.scorer.bilateral_k_spatial()
    }

    /// Set kappa-spatial for bilateral weights. Regenerates the weight table.
    pub fn set_bilateral_k_spatial(&mut self, value: f32) {
        self.scorer.set_bilateral_k_spatial(value);
    }

    pub fn reference_channel(&self) -> Option<usize> {
        self.scorer.reference_channel()
    }

    /// Restrict scoring to a single channel; see
    /// [`GridScorer::set_reference_channel`].
    pub fn set_reference_channel(&mut self, value: Option<usize>) {
        self.scorer.set_reference_channel(value);
    }

    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    /// Enable or disable the per-point candidate cache. Disabling trades
    /// memory for CPU: every query recomputes its candidates, which is the
    /// recommended mode when each patch is queried at most once.
    pub fn set_use_cache(&mut self, value: bool) {
        self.use_cache = value;
    }

    /// Scorer owning the grid, the weight table and the scoring parameters.
    pub fn scorer(&self) -> &GridScorer {
        &self.scorer
    }

    /// Compute the patch distance between `source_point` and `target_point`.
    ///
    /// Candidate lists come from the bundle caches when caching is enabled
    /// (populated lazily on first access) and are recomputed transiently
    /// otherwise; both paths produce identical results. The returned record
    /// carries the composed transforms of the winning candidate pair so
    /// callers can reproduce the exact sampling geometry.
    pub fn calculate<B: TensorBundle>(
        &self,
        source_bundle: &B,
        source_point: Point,
        target_bundle: &B,
        target_point: Point,
    ) -> DistanceInfo {
        let normalized_source = self.candidates(source_bundle, source_point);
        let normalized_target = self.candidates(target_bundle, target_point);

        let number_of_channels = target_bundle.number_of_channels();
        let target_radius = target_bundle.radius();

        let best = if self.scorer.use_bilateral() {
            self.scorer.score_geodesic(
                &normalized_source,
                &normalized_target,
                target_radius,
                number_of_channels,
            )
        } else {
            self.scorer
                .score_gaussian(&normalized_source, &normalized_target, number_of_channels)
        };

        let (source_id, target_id) = best.pair.unwrap_or((0, 0));
        DistanceInfo {
            distance: best.distance,
            source_point,
            target_point,
            source_transform: composed_or_identity(&normalized_source, source_id),
            target_transform: composed_or_identity(&normalized_target, target_id),
        }
    }

    /// Eagerly fill the candidate cache for every pixel of `bundle`.
    ///
    /// Per-pixel work is independent, so pixels are processed in parallel;
    /// cache slots make concurrent first-writes safe, and the outcome is
    /// identical to lazy per-point computation in any execution order.
    /// No-op when caching is disabled or the bundle carries no cache.
    pub fn precompute_normalized_patches<B: TensorBundle>(&self, bundle: &B) {
        if !self.use_cache {
            return;
        }
        let Some(cache) = bundle.patch_cache() else {
            return;
        };

        let size_x = bundle.size_x();
        let size_y = bundle.size_y();
        debug!(
            "precomputing normalized patches for a {}x{} bundle",
            size_x, size_y
        );

        (0..size_x * size_y).into_par_iter().for_each(|index| {
            let x = index % size_x;
            let y = index / size_x;
            cache.get_or_init(x, y, || {
                self.normalize_patch(bundle, Point::new(x as i32, y as i32))
            });
        });
    }

    fn candidates<'a, B: TensorBundle>(&self, bundle: &'a B, point: Point) -> Candidates<'a> {
        if self.use_cache {
            if let Some(cache) = bundle.patch_cache() {
                let slice = cache.get_or_init(point.x as usize, point.y as usize, || {
                    self.normalize_patch(bundle, point)
                });
                return Candidates::Cached(slice);
            }
        }
        Candidates::Transient(self.normalize_patch(bundle, point))
    }

    /// Build every normalization candidate of one point: one canonical-grid
    /// sampling per dominant orientation, each under
    /// `rotation(angle) * transform`.
    fn normalize_patch<B: TensorBundle>(&self, bundle: &B, point: Point) -> Vec<NormalizedPatch> {
        let transform = bundle.transform(point);
        let region = bundle.region(point);
        let orientations = self.normalization.dominant_orientations(
            bundle.gradient_x(),
            bundle.gradient_y(),
            &region,
            &transform,
            point,
        );

        let mut candidates = Vec::with_capacity(orientations.len());
        for angle in orientations {
            let rotation = self.normalization.rotation(angle);
            let samples = self.normalization.interpolate_to_grid(
                self.scorer.grid_ref(),
                bundle.image(),
                bundle.mask(),
                &(rotation * transform),
                point,
            );
            candidates.push(NormalizedPatch::new(samples, transform, rotation));
        }
        candidates
    }
}

impl<N: PatchNormalizer, B: TensorBundle> PatchDistance<B> for AffinePatchDistance<N> {
    fn calculate(
        &self,
        source_bundle: &B,
        source_point: Point,
        target_bundle: &B,
        target_point: Point,
    ) -> DistanceInfo {
        AffinePatchDistance::calculate(self, source_bundle, source_point, target_bundle, target_point)
    }
}

fn composed_or_identity(candidates: &[NormalizedPatch], id: usize) -> Matrix2<f32> {
    candidates
        .get(id)
        .map(NormalizedPatch::composed_transform)
        .unwrap_or_else(Matrix2::identity)
}
