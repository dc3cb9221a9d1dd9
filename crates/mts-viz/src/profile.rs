//! Profile-X of a 2D histogram and its overlay across datasets.

use mts_core::Hist2D;
use serde::{Deserialize, Serialize};

use crate::comparison::SeriesMeta;

/// Suffix appended to the 2D histogram name.
pub const PROFILE_SUFFIX: &str = "_profile";

/// Per x bin mean of the y bin centres, weighted by bin content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Mean of y, `None` for empty x bins.
    pub mean: Vec<Option<f64>>,
    /// Standard error of the mean, `None` for empty x bins.
    pub err: Vec<Option<f64>>,
    /// Summed content of each x column.
    pub entries: Vec<f64>,
}

impl Profile {
    /// Bin with the smallest mean and its `mean - err`.
    fn low_point(&self) -> Option<f64> {
        self.points().min_by(|a, b| a.0.total_cmp(&b.0)).map(|(m, e)| m - e)
    }

    /// Bin with the largest mean and its `mean + err`.
    fn high_point(&self) -> Option<f64> {
        self.points().max_by(|a, b| a.0.total_cmp(&b.0)).map(|(m, e)| m + e)
    }

    fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.mean.iter().zip(&self.err).filter_map(|(m, e)| Some(((*m)?, (*e)?)))
    }
}

/// Project `h` onto its x axis.
pub fn profile_x(h: &Hist2D) -> Profile {
    let nx = h.x.n_bins;
    let ny = h.y.n_bins;
    let centers: Vec<f64> = (0..ny).map(|iy| h.y.center(iy)).collect();

    let mut mean = Vec::with_capacity(nx);
    let mut err = Vec::with_capacity(nx);
    let mut entries = Vec::with_capacity(nx);

    for ix in 0..nx {
        let column = &h.bin_content[ix * ny..(ix + 1) * ny];
        let sum_w: f64 = column.iter().sum();
        entries.push(sum_w);
        if sum_w <= 0.0 {
            mean.push(None);
            err.push(None);
            continue;
        }
        let m = column.iter().zip(&centers).map(|(w, y)| w * y).sum::<f64>() / sum_w;
        let var = column.iter().zip(&centers).map(|(w, y)| w * (y - m) * (y - m)).sum::<f64>()
            / sum_w;
        mean.push(Some(m));
        err.push(Some((var / sum_w).sqrt()));
    }

    Profile { mean, err, entries }
}

/// Wrap a y title in `#LT ... #RT`, keeping a trailing `(unit)` outside.
pub fn profile_y_title(label: &str) -> String {
    let mut title = format!("#LT{label}");
    let unit_at_end = title.find(')') == Some(title.len() - 1) && !title.contains("#delta");
    match title.find('(').filter(|_| unit_at_end) {
        Some(open) => {
            let at = title[..open].char_indices().next_back().map_or(open, |(i, _)| i);
            title.insert_str(at, "#RT");
        }
        None => title.push_str("#RT"),
    }
    title
}

/// One dataset's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSeries {
    /// Presentation of this dataset.
    #[serde(flatten)]
    pub meta: SeriesMeta,
    /// The profile itself.
    #[serde(flatten)]
    pub profile: Profile,
}

/// Overlay of the profiles of one 2D histogram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileOverlay {
    /// `<histogram>_profile`.
    pub name: String,
    /// 2D histogram the profiles come from.
    pub histogram: String,
    /// X axis title.
    pub x_label: String,
    /// Y axis title, `#LT...#RT` wrapped.
    pub y_label: String,
    /// Shared x bin edges.
    pub bin_edges: Vec<f64>,
    /// One entry per dataset, in input order.
    pub series: Vec<ProfileSeries>,
    /// Frame y range, `None` when every profile is empty.
    pub y_range: Option<[f64; 2]>,
}

impl ProfileOverlay {
    /// Overlay `hists` (one per dataset) with the matching `series` metadata.
    pub(crate) fn new(hists: &[&Hist2D], series: &[SeriesMeta]) -> Self {
        let first = hists[0];
        let n_series = hists.len() as f64;

        let series: Vec<ProfileSeries> = hists
            .iter()
            .zip(series)
            .map(|(h, meta)| ProfileSeries { meta: meta.clone(), profile: profile_x(h) })
            .collect();

        let low = series.iter().filter_map(|s| s.profile.low_point()).reduce(f64::min);
        let high = series.iter().filter_map(|s| s.profile.high_point()).reduce(f64::max);
        let y_range = low.zip(high).map(|(lo, hi)| [0.8 * lo, hi * (1.0 + 0.25 * n_series)]);

        Self {
            name: format!("{}{PROFILE_SUFFIX}", first.name),
            histogram: first.name.clone(),
            x_label: first.x.label.clone(),
            y_label: profile_y_title(&first.y.label),
            bin_edges: first.x.edges(),
            series,
            y_range,
        }
    }
}
