//! Posterior summaries and mixing diagnostics for retained MCMC draws.
//!
//! The table mirrors what is usually printed for a sampled model: mean,
//! standard deviation, naive and time-series standard errors, quantiles,
//! lag autocorrelations and an effective sample size.

use crate::logit::sampler::PosteriorSample;
use ndarray::ArrayView1;
use statrs::statistics::Statistics;
use std::fmt;

/// Probabilities reported in [`CoefficientSummary::quantiles`].
pub const SUMMARY_QUANTILES: [f64; 5] = [0.025, 0.25, 0.5, 0.75, 0.975];

/// Lags reported in [`CoefficientSummary::autocorrelations`].
pub const AUTOCORRELATION_LAGS: [usize; 4] = [1, 5, 10, 50];

/// Lag-1 autocorrelation above which the retained draws call for more thinning.
pub const HIGH_LAG1_AUTOCORRELATION: f64 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct CoefficientSummary {
    pub name: String,
    pub mean: f64,
    pub sd: f64,
    /// `sd / √n`, ignoring autocorrelation.
    pub naive_se: f64,
    /// Batch-means standard error of the mean.
    pub time_series_se: f64,
    /// Values at [`SUMMARY_QUANTILES`].
    pub quantiles: [f64; 5],
    /// `(lag, ρ)` at [`AUTOCORRELATION_LAGS`] shorter than the chain.
    pub autocorrelations: Vec<(usize, f64)>,
    pub effective_sample_size: f64,
}

#[derive(Debug, Clone)]
pub struct PosteriorSummary {
    pub n_draws: usize,
    pub acceptance_rate: f64,
    pub coefficients: Vec<CoefficientSummary>,
}

/// Linearly interpolated quantile of sorted data (the "type 7" definition).
/// statrs only ships the R-8 estimator, so this one is kept local.
fn quantile_sorted(sorted: &[f64], prob: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let h = (n - 1) as f64 * prob.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

pub fn quantiles(values: ArrayView1<f64>, probs: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    probs.iter().map(|&p| quantile_sorted(&sorted, p)).collect()
}

/// Equal-tailed credible interval holding `level` of the posterior mass.
pub fn credible_interval(values: ArrayView1<f64>, level: f64) -> (f64, f64) {
    let tail = (1.0 - level.clamp(0.0, 1.0)) / 2.0;
    let q = quantiles(values, &[tail, 1.0 - tail]);
    (q[0], q[1])
}

/// Lag-`lag` sample autocorrelation. Zero for a constant chain.
pub fn autocorrelation(values: ArrayView1<f64>, lag: usize) -> f64 {
    let n = values.len();
    if lag >= n {
        return f64::NAN;
    }
    let m = values.iter().mean();
    let denom: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    if denom == 0.0 {
        return 0.0;
    }
    let num: f64 = (0..n - lag)
        .map(|t| (values[t] - m) * (values[t + lag] - m))
        .sum();
    num / denom
}

/// Effective sample size via Geyer's initial positive sequence.
pub fn effective_sample_size(values: ArrayView1<f64>) -> f64 {
    let n = values.len();
    if n < 4 {
        return n as f64;
    }
    let m = values.iter().mean();
    let centered: Vec<f64> = values.iter().map(|v| v - m).collect();
    let gamma0: f64 = centered.iter().map(|c| c * c).sum::<f64>() / n as f64;
    if gamma0 == 0.0 {
        return n as f64;
    }
    let rho = |lag: usize| -> f64 {
        let s: f64 = (0..n - lag).map(|t| centered[t] * centered[t + lag]).sum();
        s / n as f64 / gamma0
    };

    let mut tau = -1.0;
    let mut k = 0;
    while 2 * k + 1 < n {
        let pair = rho(2 * k) + rho(2 * k + 1);
        if pair <= 0.0 {
            break;
        }
        tau += 2.0 * pair;
        k += 1;
    }
    let tau = tau.max(1.0 / n as f64);
    (n as f64 / tau).min(n as f64 * (n as f64).log10().max(1.0))
}

/// Batch-means estimate of the Monte Carlo standard error of the mean.
pub fn time_series_se(values: ArrayView1<f64>) -> f64 {
    let n = values.len();
    let batches = (n as f64).sqrt().floor() as usize;
    if batches < 2 {
        return values.iter().std_dev() / (n.max(1) as f64).sqrt();
    }
    let size = n / batches;
    let batch_means: Vec<f64> = (0..batches)
        .map(|b| values.iter().skip(b * size).take(size).mean())
        .collect();
    let used = batches * size;
    let var_bm = size as f64 * batch_means.iter().variance();
    (var_bm / used as f64).sqrt()
}

pub fn summarize_column(name: &str, values: ArrayView1<f64>) -> CoefficientSummary {
    let n = values.len();
    let sd = values.iter().std_dev();
    let q = quantiles(values, &SUMMARY_QUANTILES);
    CoefficientSummary {
        name: name.to_string(),
        mean: values.iter().mean(),
        sd,
        naive_se: sd / (n.max(1) as f64).sqrt(),
        time_series_se: time_series_se(values),
        quantiles: [q[0], q[1], q[2], q[3], q[4]],
        autocorrelations: AUTOCORRELATION_LAGS
            .iter()
            .filter(|&&lag| lag < n)
            .map(|&lag| (lag, autocorrelation(values, lag)))
            .collect(),
        effective_sample_size: effective_sample_size(values),
    }
}

pub fn summarize(sample: &PosteriorSample) -> PosteriorSummary {
    let coefficients = sample
        .names
        .iter()
        .enumerate()
        .map(|(j, name)| summarize_column(name, sample.column(j)))
        .collect();
    PosteriorSummary {
        n_draws: sample.n_draws(),
        acceptance_rate: sample.acceptance_rate,
        coefficients,
    }
}

impl PosteriorSummary {
    /// Lag-1 autocorrelation of the worst-mixing coefficient.
    pub fn max_lag1_autocorrelation(&self) -> f64 {
        self.coefficients
            .iter()
            .filter_map(|c| c.autocorrelations.first().map(|&(_, r)| r))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn needs_more_thinning(&self) -> bool {
        self.max_lag1_autocorrelation() > HIGH_LAG1_AUTOCORRELATION
    }
}

impl fmt::Display for PosteriorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} retained draws, acceptance rate {:.3}",
            self.n_draws, self.acceptance_rate
        )?;
        writeln!(
            f,
            "{:<26} {:>11} {:>10} {:>10} {:>10} {:>11} {:>11} {:>11} {:>8}",
            "", "Mean", "SD", "Naive SE", "TS SE", "2.5%", "50%", "97.5%", "ESS"
        )?;
        for c in &self.coefficients {
            writeln!(
                f,
                "{:<26} {:>11.5} {:>10.5} {:>10.6} {:>10.6} {:>11.5} {:>11.5} {:>11.5} {:>8.0}",
                c.name,
                c.mean,
                c.sd,
                c.naive_se,
                c.time_series_se,
                c.quantiles[0],
                c.quantiles[2],
                c.quantiles[4],
                c.effective_sample_size
            )?;
        }
        writeln!(f, "Autocorrelation:")?;
        for c in &self.coefficients {
            let lags = c
                .autocorrelations
                .iter()
                .map(|(lag, r)| format!("lag {lag}: {r:.3}"))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(f, "  {:<24} {}", c.name, lags)?;
        }
        Ok(())
    }
}
