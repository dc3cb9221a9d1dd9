//! Dataset pipeline: source → aggregation → statistics → artifact.
//!
//! Datasets share nothing but the read-only policy, so [`produce_all`] runs
//! them on the rayon pool and reports each outcome separately.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::aggregate::{AggregateOptions, ResidualAggregator};
use crate::error::{Error, Result};
use crate::export::{ArtifactHandle, DatasetArtifact, Provenance, export_dataset, validate_dataset_id};
use crate::policy::VariablePolicy;
use crate::source::{ParquetSource, RecordSource};
use crate::stats::OutlierTrim;

/// One input dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetJob {
    /// Dataset identifier (artifact file stem).
    pub name: String,
    /// Parquet file with the splitter tree columns.
    pub input: PathBuf,
}

/// Settings shared by every dataset of a run.
#[derive(Debug, Clone, Default)]
pub struct ProduceOptions {
    /// Histogram booking.
    pub aggregate: AggregateOptions,
    /// Outlier trimming for the statistics.
    pub trim: OutlierTrim,
    /// Directory receiving the artifacts.
    pub out_dir: PathBuf,
}

/// Result of one dataset in a multi-dataset run.
#[derive(Debug)]
pub struct DatasetOutcome {
    /// Dataset identifier.
    pub dataset: String,
    /// Artifact handle, or the failure that stopped this dataset.
    pub result: Result<ArtifactHandle>,
}

/// Aggregate `source`, summarize and build the artifact without writing it.
pub fn process_source<S: RecordSource + ?Sized>(
    dataset: &str,
    input: Option<&Path>,
    source: &mut S,
    policy: &VariablePolicy,
    options: &ProduceOptions,
) -> Result<DatasetArtifact> {
    validate_dataset_id(dataset)?;
    options.trim.validate()?;

    let aggregation = ResidualAggregator::new(policy, options.aggregate).run(source)?;
    let n_records = aggregation.n_records;
    let (histograms, stats) = aggregation.into_summary(options.trim)?;

    let provenance = Provenance {
        input: input.map(|p| p.display().to_string()),
        options: options.aggregate,
        trim: options.trim,
        n_records,
    };
    DatasetArtifact::new(dataset, histograms, &stats, provenance)
}

/// Produce and export the artifact of one dataset.
pub fn produce_dataset(
    job: &DatasetJob,
    policy: &VariablePolicy,
    options: &ProduceOptions,
) -> Result<ArtifactHandle> {
    log::info!("dataset '{}': reading {}", job.name, job.input.display());
    validate_dataset_id(&job.name)?;

    let mut source = ParquetSource::open(&job.input, policy.variables())?;
    let artifact = process_source(&job.name, Some(&job.input), &mut source, policy, options)?;
    export_dataset(&options.out_dir, &artifact)
}

/// Produce every dataset in parallel; outcomes keep the order of `jobs`.
///
/// Jobs sharing a name would write the same artifact, so every one of them
/// fails with [`Error::Configuration`] and none is run.
pub fn produce_all(
    jobs: &[DatasetJob],
    policy: &VariablePolicy,
    options: &ProduceOptions,
) -> Vec<DatasetOutcome> {
    let mut uses: HashMap<&str, usize> = HashMap::new();
    for job in jobs {
        *uses.entry(job.name.as_str()).or_default() += 1;
    }
    jobs.par_iter()
        .map(|job| {
            let result = if uses.get(job.name.as_str()).is_some_and(|&n| n > 1) {
                let msg = format!("dataset '{}' appears more than once", job.name);
                Err(Error::Configuration(msg))
            } else {
                produce_dataset(job, policy, options)
            };
            if let Err(e) = &result {
                log::error!("dataset '{}' failed: {e}", job.name);
            }
            DatasetOutcome { dataset: job.name.clone(), result }
        })
        .collect()
}
