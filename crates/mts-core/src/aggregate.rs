//! Single-pass residual aggregation over a record source.
//!
//! For every record and variable `j` the aggregator fills the `original`,
//! `delta` and `pull` histograms of `j` and the 2D correlations of `j`
//! against its partners `k` (selected by [`PairPolicy`]). A value enters the
//! sample set used for statistics only if its fill landed in a bin.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::histogram::{Accumulator, Fill, Hist1D, Hist2D, HistogramBuilder};
use crate::policy::{Region, VariablePolicy};
use crate::record::{Derived, Kind, SplitRecord};
use crate::source::RecordSource;
use crate::stats::{DatasetStats, NamedSummary, OutlierTrim, summarize};

/// Records between two progress log lines.
pub const PROGRESS_EVERY: u64 = 1000;

/// Which ordered variable pairs get 2D correlation histograms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairPolicy {
    /// Every ordered pair `(j, k)` with `j != k`.
    #[default]
    All,
    /// Only `k < j`.
    Lower,
}

impl PairPolicy {
    /// Partners of variable `j` among `n` variables, in variable order.
    pub fn partners(self, j: usize, n: usize) -> impl Iterator<Item = usize> {
        let end = match self {
            PairPolicy::All => n,
            PairPolicy::Lower => j,
        };
        (0..end).filter(move |&k| k != j)
    }
}

/// Booking options for one aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregateOptions {
    /// Detector region the histograms are booked for.
    pub region: Region,
    /// 2D pair selection.
    pub pairs: PairPolicy,
}

/// In-range values of one 1D histogram, kept for statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    /// Name of the histogram the values were filled into.
    pub name: String,
    /// Variable the values belong to.
    pub variable: String,
    /// Quantity kind.
    pub kind: Kind,
    /// Values in insertion order.
    pub values: Vec<f64>,
    /// Values skipped because they were undefined or NaN.
    pub non_finite: u64,
}

struct Correlation {
    partner: usize,
    vs_original: Hist2D,
    vs_delta: Hist2D,
}

/// Output of one pass, before statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    /// Histograms in output order.
    pub accumulators: Vec<Accumulator>,
    /// One sample set per 1D histogram, in the same order.
    pub samples: Vec<SampleSet>,
    /// Records read from the source.
    pub n_records: u64,
}

impl Aggregation {
    /// Summarize every sample set, consuming them.
    pub fn into_summary(self, trim: OutlierTrim) -> Result<(Vec<Accumulator>, DatasetStats)> {
        let mut entries = Vec::with_capacity(self.samples.len());
        for set in self.samples {
            let summary = summarize(&set.name, set.values, trim)?;
            entries.push(NamedSummary {
                name: set.name,
                variable: set.variable,
                kind: set.kind,
                summary,
            });
        }
        Ok((self.accumulators, DatasetStats { entries }))
    }

    /// Look up an accumulator by name.
    pub fn accumulator(&self, name: &str) -> Option<&Accumulator> {
        self.accumulators.iter().find(|a| a.name() == name)
    }

    /// Look up a sample set by histogram name.
    pub fn sample_set(&self, name: &str) -> Option<&SampleSet> {
        self.samples.iter().find(|s| s.name == name)
    }
}

/// Streams records into histograms and sample sets.
#[derive(Debug, Clone, Copy)]
pub struct ResidualAggregator<'a> {
    policy: &'a VariablePolicy,
    options: AggregateOptions,
}

impl<'a> ResidualAggregator<'a> {
    /// Aggregator over the variables of `policy`.
    pub fn new(policy: &'a VariablePolicy, options: AggregateOptions) -> Self {
        Self { policy, options }
    }

    /// Drain `source` in one pass.
    pub fn run<S: RecordSource + ?Sized>(&self, source: &mut S) -> Result<Aggregation> {
        let variables = self.policy.variables();
        let n = variables.len();
        let builder = HistogramBuilder::new(self.policy, self.options.region);

        let mut one_d: Vec<[Hist1D; 3]> = Vec::with_capacity(n);
        let mut samples: Vec<[SampleSet; 3]> = Vec::with_capacity(n);
        let mut two_d: Vec<Vec<Correlation>> = Vec::with_capacity(n);

        for (j, v) in variables.iter().enumerate() {
            let names = Kind::ALL.map(|kind| kind.hist_name(&v.name));
            one_d.push([
                builder.build_1d(&names[0])?,
                builder.build_1d(&names[1])?,
                builder.build_1d(&names[2])?,
            ]);
            samples.push(std::array::from_fn(|i| SampleSet {
                name: names[i].clone(),
                variable: v.name.clone(),
                kind: Kind::ALL[i],
                values: Vec::new(),
                non_finite: 0,
            }));

            let mut pairs = Vec::new();
            for k in self.options.pairs.partners(j, n) {
                let other = &variables[k].name;
                pairs.push(Correlation {
                    partner: k,
                    vs_original: builder.build_2d(&v.name, other)?,
                    vs_delta: builder.build_2d(&v.name, &Kind::Delta.hist_name(other))?,
                });
            }
            two_d.push(pairs);
        }

        let total = source.total();
        log::info!("aggregating {total} records over {n} variables");

        let mut record = SplitRecord::for_variables(variables);
        let mut derived: Vec<Derived> = Vec::with_capacity(n);
        let mut n_records = 0u64;

        while source.next_into(&mut record)? {
            if n_records > 0 && n_records % PROGRESS_EVERY == 0 {
                log::debug!("processed {n_records}/{total} records");
            }

            derived.clear();
            derived.extend(
                record.measurements.iter().zip(variables).map(|(m, v)| m.derive(v.rel_scale)),
            );

            for j in 0..n {
                let d = derived[j];
                for (i, kind) in Kind::ALL.into_iter().enumerate() {
                    let set = &mut samples[j][i];
                    match d.get(kind).map(|x| (x, one_d[j][i].fill(x))) {
                        Some((x, Fill::InRange)) => set.values.push(x),
                        Some((_, Fill::OutOfRange)) => {}
                        Some((_, Fill::NonFinite)) | None => set.non_finite += 1,
                    }
                }
                for c in &mut two_d[j] {
                    c.vs_original.fill(d.original, derived[c.partner].original);
                    c.vs_delta.fill(d.original, derived[c.partner].delta);
                }
            }
            n_records += 1;
        }

        log::info!("aggregated {n_records} records");

        let mut accumulators = Vec::new();
        for (hists, pairs) in one_d.into_iter().zip(two_d) {
            accumulators.extend(hists.into_iter().map(Accumulator::OneD));
            for c in pairs {
                accumulators.push(Accumulator::TwoD(c.vs_original));
                accumulators.push(Accumulator::TwoD(c.vs_delta));
            }
        }

        let samples: Vec<SampleSet> = samples.into_iter().flatten().collect();
        for set in &samples {
            if set.non_finite > 0 {
                log::debug!("{}: {} undefined values excluded", set.name, set.non_finite);
            }
        }

        Ok(Aggregation { accumulators, samples, n_records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::builtin;
    use crate::source::ColumnSource;
    use std::collections::HashMap;

    #[test]
    fn partners_by_policy() {
        assert_eq!(PairPolicy::All.partners(1, 3).collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(PairPolicy::Lower.partners(2, 3).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(PairPolicy::Lower.partners(0, 3).count(), 0);
    }

    #[test]
    fn output_order_and_counts() {
        let mut src = ColumnSource::new(builtin().variables(), HashMap::new()).unwrap();
        for (pairs, n_2d) in [(PairPolicy::All, 7 * 6 * 2), (PairPolicy::Lower, 7 * 6)] {
            let agg = ResidualAggregator::new(builtin(), AggregateOptions { pairs, ..Default::default() })
                .run(&mut src)
                .unwrap();
            let names: Vec<&str> = agg.accumulators.iter().map(|a| a.name()).collect();
            assert_eq!(&names[..3], ["pt", "Delta_pt", "Delta_pt_pull"]);
            assert_eq!(agg.accumulators.iter().filter(|a| a.as_two_d().is_some()).count(), n_2d);
            assert_eq!(agg.samples.len(), 21);
            assert_eq!(agg.n_records, 0);
        }
    }

    #[test]
    fn all_pairs_follow_their_variable() {
        let mut src = ColumnSource::new(builtin().variables(), HashMap::new()).unwrap();
        let agg = ResidualAggregator::new(builtin(), AggregateOptions::default()).run(&mut src).unwrap();
        let names: Vec<&str> = agg.accumulators.iter().map(|a| a.name()).collect();
        assert_eq!(&names[3..7], ["pt_VS_eta", "pt_VS_Delta_eta", "pt_VS_phi", "pt_VS_Delta_phi"]);
        assert!(!names.contains(&"pt_VS_pt"));
        assert!(!names.contains(&"pt_VS_Delta_pt"));
    }
}
