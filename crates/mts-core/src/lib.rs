//! # mts-core
//!
//! Split-track residual engine for MTS alignment validation.
//!
//! Per-track split measurements are streamed from a [`RecordSource`], turned
//! into original / Delta / pull quantities, filled into 1D and 2D histograms
//! booked from a [`VariablePolicy`], and summarized with trimmed mean and
//! standard deviation. Each dataset ends up as one JSON artifact that the
//! comparison step reads.
//!
//! ## Example
//!
//! ```no_run
//! use mts_core::{DatasetJob, ProduceOptions, policy, produce_dataset};
//!
//! let job = DatasetJob { name: "Kappa1".into(), input: "splitter.parquet".into() };
//! let opts = ProduceOptions { out_dir: "out".into(), ..Default::default() };
//! let handle = produce_dataset(&job, policy::builtin(), &opts).unwrap();
//! println!("{}", handle.path.display());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Crate version, recorded in every artifact.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod aggregate;
pub mod error;
pub mod export;
pub mod histogram;
pub mod pipeline;
pub mod policy;
pub mod record;
pub mod source;
pub mod stats;

pub use aggregate::{AggregateOptions, Aggregation, PairPolicy, ResidualAggregator, SampleSet};
pub use error::{Error, Result};
pub use export::{
    ArtifactHandle, ArtifactMeta, DatasetArtifact, NamedScalar, Provenance, export_dataset,
    read_artifact,
};
pub use histogram::{Accumulator, Axis, Fill, Hist1D, Hist2D, HistogramBuilder, axis_unit};
pub use pipeline::{DatasetJob, DatasetOutcome, ProduceOptions, process_source, produce_all, produce_dataset};
pub use policy::{AxisSpec, Binning, PolicyEntry, Region, Variable, VariablePolicy};
pub use record::{Derived, Kind, SplitColumns, SplitMeasurement, SplitRecord};
pub use source::{ColumnSource, ParquetSource, RecordSource};
pub use stats::{DatasetStats, NamedSummary, OutlierTrim, Summary, summarize};
