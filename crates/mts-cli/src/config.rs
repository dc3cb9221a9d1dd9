//! `mts run` configuration.

use anyhow::{Context, Result};
use mts_core::{AggregateOptions, DatasetJob, OutlierTrim, PairPolicy, ProduceOptions, Region};
use mts_viz::SeriesMeta;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Directory receiving one artifact per dataset and the comparison.
    pub out_dir: PathBuf,

    /// Datasets, in legend order.
    pub datasets: Vec<DatasetConfig>,

    /// Fraction of central samples kept for mean/stdDev; absent or 0 disables trimming.
    #[serde(default)]
    pub outlier: Option<f64>,

    #[serde(default)]
    pub region: Region,

    #[serde(default)]
    pub pairs: PairPolicy,

    /// Threads (0 = rayon default).
    #[serde(default)]
    pub threads: usize,

    #[serde(default)]
    pub legend_title: String,

    /// Binning policy JSON; the built-in table when absent.
    #[serde(default)]
    pub policy: Option<PathBuf>,

    /// Comparison artifact file name inside `out_dir`.
    #[serde(default = "default_comparison")]
    pub comparison: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetConfig {
    pub name: String,
    pub input: PathBuf,
    /// Legend entry, defaults to `name`.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub color: Option<i32>,
    #[serde(default)]
    pub style: Option<i32>,
}

fn default_comparison() -> String {
    "comparison.json".to_string()
}

pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut cfg: RunConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("invalid run config {}", path.display()))?;

    // Relative paths are relative to the config file.
    let base = path.parent().unwrap_or(Path::new(""));
    cfg.out_dir = base.join(&cfg.out_dir);
    cfg.policy = cfg.policy.map(|p| base.join(p));
    for d in &mut cfg.datasets {
        d.input = base.join(&d.input);
    }

    if cfg.datasets.is_empty() {
        anyhow::bail!("{}: no datasets configured", path.display());
    }
    // Each dataset writes `<name>.json` next to the comparison.
    let mut seen = HashSet::new();
    for d in &cfg.datasets {
        if !seen.insert(d.name.as_str()) {
            anyhow::bail!("{}: dataset '{}' appears more than once", path.display(), d.name);
        }
        if format!("{}.json", d.name) == cfg.comparison {
            anyhow::bail!(
                "{}: dataset '{}' would overwrite the comparison {}",
                path.display(),
                d.name,
                cfg.comparison
            );
        }
    }
    Ok(cfg)
}

impl RunConfig {
    pub fn produce_options(&self) -> ProduceOptions {
        ProduceOptions {
            aggregate: AggregateOptions { region: self.region, pairs: self.pairs },
            trim: OutlierTrim::from_option(self.outlier),
            out_dir: self.out_dir.clone(),
        }
    }

    pub fn jobs(&self) -> Vec<DatasetJob> {
        self.datasets
            .iter()
            .map(|d| DatasetJob { name: d.name.clone(), input: d.input.clone() })
            .collect()
    }
}

impl DatasetConfig {
    /// Presentation of the `index`-th dataset.
    pub fn series(&self, index: usize) -> SeriesMeta {
        let mut meta = SeriesMeta::with_defaults(self.title.as_deref().unwrap_or(&self.name), index);
        if let Some(c) = self.color {
            meta.color = c;
        }
        if let Some(s) = self.style {
            meta.marker_style = s;
        }
        meta
    }
}
