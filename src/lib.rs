//! Affine-Invariant Patch Similarity
//!
//! Geometry-robust distance between two local image neighborhoods that may
//! be related by an unknown local affine deformation (rotation, anisotropic
//! scale, shear), for self-similarity search tasks such as patch-based
//! restoration. Patches are resampled onto a shared regular grid spanning
//! the unit disc, one candidate per dominant orientation, and scored with
//! Gaussian or bilateral (approximated geodesic) weighting; the reported
//! distance is the minimum over every candidate pair.
//!
//! Image access, structure tensor estimation and grid interpolation are
//! supplied by the caller through the [`TensorBundle`] and
//! [`PatchNormalizer`] traits.

pub mod affine;
pub mod bundle;
pub mod math;
pub mod normalization;
pub mod scoring;
pub mod types;

// Re-export commonly used types at the crate root
pub use affine::{AffinePatchDistance, PatchDistance};
pub use bundle::{PatchCache, TensorBundle};
pub use normalization::{GridInfo, PatchNormalizer};
pub use scoring::{BestPair, GridScorer};
pub use types::{DistanceInfo, NormalizedPatch, Point, SAMPLE_UNKNOWN};
