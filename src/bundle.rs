//! Structure-tensor bundle seam and the per-point candidate cache.

use std::sync::OnceLock;

use nalgebra::Matrix2;
use ndarray::{ArrayView2, ArrayView3};

use crate::types::{NormalizedPatch, Point};

/// Contract of the structure-tensor bundle collaborator: an image together
/// with its gradient fields, validity mask and per-point local affine
/// transforms.
///
/// The image, gradients, mask and transforms are read-only; the only
/// mutable state reachable through a bundle is the candidate cache, which
/// is explicitly concurrent (see [`PatchCache`]).
pub trait TensorBundle: Sync {
    fn number_of_channels(&self) -> usize;

    fn size_x(&self) -> usize;

    fn size_y(&self) -> usize;

    /// Image samples, channels × height × width.
    fn image(&self) -> ArrayView3<'_, f32>;

    fn gradient_x(&self) -> ArrayView2<'_, f32>;

    fn gradient_y(&self) -> ArrayView2<'_, f32>;

    /// Validity mask, height × width; nonzero marks a valid pixel.
    fn mask(&self) -> ArrayView2<'_, u8>;

    /// Ordered patch neighborhood sampled for orientation estimation.
    fn region(&self, point: Point) -> Vec<Point>;

    /// Local affine transform of the structure tensor field at `point`.
    fn transform(&self, point: Point) -> Matrix2<f32>;

    /// Patch radius in source-image units.
    fn radius(&self) -> f32;

    /// Per-point candidate cache, if this bundle carries one. Bundles that
    /// return `None` force the engine into transient (uncached) mode.
    fn patch_cache(&self) -> Option<&PatchCache>;
}

/// Concurrent per-pixel cache of normalization candidates.
///
/// One slot per pixel, keyed by `y * size_x + x`. Slots are lazily
/// populated with single-writer-per-key semantics: when several threads
/// race on the same empty slot, each computes its own candidate list but
/// exactly one is published and the rest are dropped, so readers always
/// observe either nothing or one complete list. Reads after publication
/// are lock-free, which makes concurrent queries after a bulk precompute
/// synchronization-free.
#[derive(Debug)]
pub struct PatchCache {
    size_x: usize,
    size_y: usize,
    slots: Vec<OnceLock<Vec<NormalizedPatch>>>,
}

impl PatchCache {
    pub fn new(size_x: usize, size_y: usize) -> Self {
        let slots = (0..size_x * size_y).map(|_| OnceLock::new()).collect();
        Self {
            size_x,
            size_y,
            slots,
        }
    }

    pub fn size_x(&self) -> usize {
        self.size_x
    }

    pub fn size_y(&self) -> usize {
        self.size_y
    }

    /// Candidate list for a pixel, or `None` if the slot has not been
    /// populated yet.
    pub fn get(&self, x: usize, y: usize) -> Option<&[NormalizedPatch]> {
        self.slots[self.index(x, y)].get().map(Vec::as_slice)
    }

    /// Candidate list for a pixel, populating the slot with `init` on
    /// first access. Concurrent callers on the same pixel all receive the
    /// single published list.
    pub fn get_or_init<F>(&self, x: usize, y: usize, init: F) -> &[NormalizedPatch]
    where
        F: FnOnce() -> Vec<NormalizedPatch>,
    {
        self.slots[self.index(x, y)].get_or_init(init)
    }

    /// Drop every cached candidate list, keeping the dimensions.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.take();
        }
    }

    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.size_x && y < self.size_y);
        y * self.size_x + x
    }
}
