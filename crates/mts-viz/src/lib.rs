//! # mts-viz
//!
//! Comparison overlays for MTS dataset artifacts.
//!
//! Like the rest of the workspace this crate draws nothing: it turns several
//! `mts_histograms_v1` artifacts into one plot-friendly JSON structure
//! (arrays instead of nested objects) that an external renderer consumes.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Comparison artifact assembly.
pub mod comparison;

/// 1D distribution overlays.
pub mod distribution;

/// Profile-X overlays of 2D histograms.
pub mod profile;

pub use comparison::{
    COMPARISON_SCHEMA_V1, ComparisonArtifact, ComparisonMeta, Overlay, SeriesMeta,
    comparison_artifact, write_comparison,
};
pub use distribution::{DistributionOverlay, DistributionSeries, LegendStats};
pub use profile::{Profile, ProfileOverlay, ProfileSeries, profile_x, profile_y_title};
