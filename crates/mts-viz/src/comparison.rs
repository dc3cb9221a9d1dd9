//! Comparison artifact (`mts_comparison_v1`) over several datasets.
//!
//! Keys come from the first artifact, in its order. Every other artifact must
//! carry the same key with the same kind of histogram.

use std::path::Path;

use mts_core::{Accumulator, DatasetArtifact, Error, Hist1D, Hist2D, Result};
use serde::{Deserialize, Serialize};

use crate::distribution::DistributionOverlay;
use crate::profile::ProfileOverlay;

/// Schema tag of the comparison artifact.
pub const COMPARISON_SCHEMA_V1: &str = "mts_comparison_v1";

/// Colors used when none are given (ROOT `kBlue`, `kRed`).
pub const DEFAULT_COLORS: [i32; 2] = [600, 632];

/// Marker style used when none is given (full square).
pub const DEFAULT_MARKER_STYLE: i32 = 21;

/// How one dataset is drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesMeta {
    /// Legend entry.
    pub title: String,
    /// ROOT color index.
    pub color: i32,
    /// ROOT marker style.
    pub marker_style: i32,
}

impl SeriesMeta {
    /// Series with explicit presentation.
    pub fn new(title: impl Into<String>, color: i32, marker_style: i32) -> Self {
        Self { title: title.into(), color, marker_style }
    }

    /// Default presentation for the `index`-th dataset.
    pub fn with_defaults(title: impl Into<String>, index: usize) -> Self {
        Self::new(title, DEFAULT_COLORS[index % DEFAULT_COLORS.len()], DEFAULT_MARKER_STYLE)
    }
}

/// One overlay, in the key order of the first artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Overlay {
    /// A 1D histogram drawn for every dataset.
    Distribution(DistributionOverlay),
    /// The profile along x of a 2D histogram.
    Profile(ProfileOverlay),
}

impl Overlay {
    /// Output key (`<h>` or `<h>_profile`).
    pub fn name(&self) -> &str {
        match self {
            Overlay::Distribution(d) => &d.name,
            Overlay::Profile(p) => &p.name,
        }
    }
}

/// Provenance of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMeta {
    /// Producing tool, always `mts`.
    pub tool: String,
    /// Version of the producing tool.
    pub tool_version: String,
    /// Header line of every legend, may be empty.
    pub legend_title: String,
    /// Dataset ids, in series order.
    pub datasets: Vec<String>,
}

/// Every overlay of one comparison (`mts_comparison_v1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonArtifact {
    /// Always [`COMPARISON_SCHEMA_V1`].
    pub schema_version: String,
    /// Provenance and legend header.
    pub meta: ComparisonMeta,
    /// Overlays in the key order of the first dataset artifact.
    pub overlays: Vec<Overlay>,
}

impl ComparisonArtifact {
    /// Overlay by output key.
    pub fn overlay(&self, name: &str) -> Option<&Overlay> {
        self.overlays.iter().find(|o| o.name() == name)
    }
}

fn missing(artifact: &DatasetArtifact, name: &str, kind: &str) -> Error {
    Error::Validation(format!(
        "dataset '{}' has no {kind} histogram '{name}'",
        artifact.meta.dataset
    ))
}

/// Build the comparison of `artifacts`, drawn with `series[i]` for
/// `artifacts[i]`.
pub fn comparison_artifact(
    artifacts: &[DatasetArtifact],
    series: &[SeriesMeta],
    legend_title: &str,
) -> Result<ComparisonArtifact> {
    let Some(first) = artifacts.first() else {
        return Err(Error::Validation("comparison needs at least one artifact".into()));
    };
    if series.len() != artifacts.len() {
        return Err(Error::Validation(format!(
            "{} series descriptions for {} artifacts",
            series.len(),
            artifacts.len()
        )));
    }
    let refs: Vec<&DatasetArtifact> = artifacts.iter().collect();

    let mut overlays = Vec::with_capacity(first.histograms.len());
    for acc in &first.histograms {
        let name = acc.name();
        match acc {
            Accumulator::OneD(_) => {
                let hists = artifacts
                    .iter()
                    .map(|a| a.hist_1d(name).ok_or_else(|| missing(a, name, "1D")))
                    .collect::<Result<Vec<&Hist1D>>>()?;
                overlays.push(Overlay::Distribution(DistributionOverlay::new(
                    &refs, &hists, series,
                )?));
            }
            Accumulator::TwoD(_) => {
                let hists = artifacts
                    .iter()
                    .map(|a| a.hist_2d(name).ok_or_else(|| missing(a, name, "2D")))
                    .collect::<Result<Vec<&Hist2D>>>()?;
                if let Some((a, h)) = artifacts.iter().zip(&hists).find(|(_, h)| {
                    h.x.n_bins != hists[0].x.n_bins || h.y.n_bins != hists[0].y.n_bins
                }) {
                    return Err(Error::Validation(format!(
                        "'{name}' in dataset '{}' has {}x{} bins, expected {}x{}",
                        a.meta.dataset, h.x.n_bins, h.y.n_bins, hists[0].x.n_bins, hists[0].y.n_bins
                    )));
                }
                overlays.push(Overlay::Profile(ProfileOverlay::new(&hists, series)));
            }
        }
    }
    log::debug!("built {} overlays over {} datasets", overlays.len(), artifacts.len());

    Ok(ComparisonArtifact {
        schema_version: COMPARISON_SCHEMA_V1.to_string(),
        meta: ComparisonMeta {
            tool: "mts".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            legend_title: legend_title.to_string(),
            datasets: artifacts.iter().map(|a| a.meta.dataset.clone()).collect(),
        },
        overlays,
    })
}

/// Write `artifact` as pretty JSON to `path`, creating its parent directory.
pub fn write_comparison(path: &Path, artifact: &ComparisonArtifact) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(artifact)?)?;
    log::info!("wrote {} overlays to {}", artifact.overlays.len(), path.display());
    Ok(())
}
