//! Per-dataset histogram artifact (`mts_histograms_v1`).
//!
//! One JSON file per dataset holds every accumulator in output order and,
//! for each 1D histogram `<h>`, the scalars `mean_<h>` and `stdDev_<h>`.
//! These keys are the only contract with the comparison step.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateOptions, PairPolicy};
use crate::error::{Error, Result};
use crate::histogram::{Accumulator, Hist1D, Hist2D};
use crate::policy::Region;
use crate::stats::{DatasetStats, OutlierTrim};

/// Schema tag written into every artifact.
pub const HISTOGRAMS_SCHEMA_V1: &str = "mts_histograms_v1";

/// Prefix of the mean scalar of a histogram.
pub const MEAN_PREFIX: &str = "mean_";

/// Prefix of the standard deviation scalar of a histogram.
pub const STD_DEV_PREFIX: &str = "stdDev_";

/// Provenance of an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Producing tool, always `mts`.
    pub tool: String,
    /// Version of the producing tool.
    pub tool_version: String,
    /// Dataset identifier (also the file stem).
    pub dataset: String,
    /// Record source the histograms were filled from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    /// Detector region the binning was chosen for.
    pub region: Region,
    /// Which 2D correlation pairs were booked.
    pub pairs: PairPolicy,
    /// Outlier fraction, `None` when trimming was disabled.
    pub outlier_fraction: Option<f64>,
    /// Records read from the source.
    pub n_records: u64,
}

/// A named scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedScalar {
    /// `mean_<h>` or `stdDev_<h>`.
    pub name: String,
    /// Scalar value.
    pub value: f64,
}

/// Everything persisted for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetArtifact {
    /// Always [`HISTOGRAMS_SCHEMA_V1`].
    pub schema_version: String,
    /// Provenance.
    pub meta: ArtifactMeta,
    /// Accumulators in output order.
    pub histograms: Vec<Accumulator>,
    /// Mean and standard deviation of every 1D histogram.
    pub scalars: Vec<NamedScalar>,
}

/// Where an artifact was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    /// Dataset identifier.
    pub dataset: String,
    /// Artifact file.
    pub path: PathBuf,
}

/// Run parameters recorded in the artifact metadata.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    /// Record source location.
    pub input: Option<String>,
    /// Booking options used by the aggregator.
    pub options: AggregateOptions,
    /// Trim applied to the statistics.
    pub trim: OutlierTrim,
    /// Records aggregated.
    pub n_records: u64,
}

/// Reject dataset ids that are not usable as a file stem.
pub fn validate_dataset_id(dataset: &str) -> Result<()> {
    let bad = dataset.trim().is_empty()
        || dataset == "."
        || dataset == ".."
        || dataset.contains(['/', '\\', '\0']);
    if bad {
        return Err(Error::Configuration(format!("invalid dataset id '{dataset}'")));
    }
    Ok(())
}

impl DatasetArtifact {
    /// Assemble an artifact from filled accumulators and their statistics.
    pub fn new(
        dataset: &str,
        histograms: Vec<Accumulator>,
        stats: &DatasetStats,
        provenance: Provenance,
    ) -> Result<Self> {
        validate_dataset_id(dataset)?;

        let mut scalars = Vec::with_capacity(2 * stats.entries.len());
        for e in &stats.entries {
            scalars.push(NamedScalar {
                name: format!("{MEAN_PREFIX}{}", e.name),
                value: e.summary.mean,
            });
            scalars.push(NamedScalar {
                name: format!("{STD_DEV_PREFIX}{}", e.name),
                value: e.summary.std_dev,
            });
        }

        Ok(Self {
            schema_version: HISTOGRAMS_SCHEMA_V1.to_string(),
            meta: ArtifactMeta {
                tool: "mts".to_string(),
                tool_version: crate::VERSION.to_string(),
                dataset: dataset.to_string(),
                input: provenance.input,
                region: provenance.options.region,
                pairs: provenance.options.pairs,
                outlier_fraction: provenance.trim.fraction(),
                n_records: provenance.n_records,
            },
            histograms,
            scalars,
        })
    }

    /// Scalar by name.
    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.scalars.iter().find(|s| s.name == name).map(|s| s.value)
    }

    /// Accumulator by name.
    pub fn histogram(&self, name: &str) -> Option<&Accumulator> {
        self.histograms.iter().find(|h| h.name() == name)
    }

    /// 1D histogram by name.
    pub fn hist_1d(&self, name: &str) -> Option<&Hist1D> {
        self.histogram(name).and_then(Accumulator::as_one_d)
    }

    /// 2D histogram by name.
    pub fn hist_2d(&self, name: &str) -> Option<&Hist2D> {
        self.histogram(name).and_then(Accumulator::as_two_d)
    }

    /// `(mean, stdDev)` persisted for histogram `name`.
    pub fn summary(&self, name: &str) -> Option<(f64, f64)> {
        Some((
            self.scalar(&format!("{MEAN_PREFIX}{name}"))?,
            self.scalar(&format!("{STD_DEV_PREFIX}{name}"))?,
        ))
    }
}

/// Artifact file of `dataset` under `out_dir`.
pub fn artifact_path(out_dir: &Path, dataset: &str) -> PathBuf {
    out_dir.join(format!("{dataset}.json"))
}

/// Write `artifact` to `<out_dir>/<dataset>.json`, creating `out_dir`.
pub fn export_dataset(out_dir: &Path, artifact: &DatasetArtifact) -> Result<ArtifactHandle> {
    let dataset = &artifact.meta.dataset;
    validate_dataset_id(dataset)?;

    std::fs::create_dir_all(out_dir)?;
    let path = artifact_path(out_dir, dataset);
    std::fs::write(&path, serde_json::to_string_pretty(artifact)?)?;
    log::info!("wrote {} histograms for '{dataset}' to {}", artifact.histograms.len(), path.display());

    Ok(ArtifactHandle { dataset: dataset.clone(), path })
}

/// Read an artifact written by [`export_dataset`].
pub fn read_artifact(path: &Path) -> Result<DatasetArtifact> {
    let bytes = std::fs::read(path)?;
    let artifact: DatasetArtifact = serde_json::from_slice(&bytes)?;
    if artifact.schema_version != HISTOGRAMS_SCHEMA_V1 {
        return Err(Error::Validation(format!(
            "{}: unsupported schema_version '{}' (expected {HISTOGRAMS_SCHEMA_V1})",
            path.display(),
            artifact.schema_version
        )));
    }
    Ok(artifact)
}
