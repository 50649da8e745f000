use crate::data::SurvivalData;
use crate::error::{Result, SurvivalError};

// z for the 95% confidence band
const Z_95: f64 = 1.959964;

/// one knot of the kaplan-meier curve (a distinct event time)
#[derive(Debug, Clone)]
pub struct KaplanMeierStep {
    /// event time
    pub time: f64,
    /// number at risk just before this time (censored ties still count)
    pub n_risk: usize,
    /// number of events at this time
    pub n_events: usize,
    /// number censored strictly between the previous knot and this one
    pub n_censored: usize,
    /// product-limit estimate S(t)
    pub survival: f64,
    /// greenwood standard error of S(t)
    pub std_err: f64,
    /// lower 95% bound, log(-log) transformed then clamped to [0, 1]
    pub ci_lower: f64,
    /// upper 95% bound, log(-log) transformed then clamped to [0, 1]
    pub ci_upper: f64,
}

/// kaplan-meier estimate of the survival function
///
/// the curve is a right-continuous step function with one knot per distinct
/// event time. censoring-only times are not knots but do shrink the risk set
/// at later times. the curve is undefined past the largest observed duration
/// (event or censored) - queries there return `None` rather than extrapolate.
#[derive(Debug, Clone)]
pub struct KaplanMeierCurve {
    steps: Vec<KaplanMeierStep>,
    n_total: usize,
    n_events: usize,
    max_observed_time: f64,
}

impl KaplanMeierCurve {
    /// estimate the survival curve from a sample (covariates are ignored)
    pub fn fit(data: &SurvivalData) -> Result<Self> {
        let order = data.sorted_indices();
        let times = data.times();
        let events = data.events();
        let n = data.n_samples();

        // collapse the sorted sample into distinct event times, carrying the
        // count of censored subjects that left since the previous knot.
        // censored subjects tied with an event time stay at risk at that time
        // and only leave the risk set afterwards.
        struct Knot {
            time: f64,
            events: usize,
            censored_before: usize,
        }

        let mut knots: Vec<Knot> = Vec::new();
        let mut censored_accum = 0usize;

        let mut i = 0;
        while i < n {
            let t = times[order[i]];

            // gather everything tied at t before classifying, so the result
            // does not depend on how event and censored rows interleave in
            // the input
            let mut events_at_t = 0usize;
            let mut censored_at_t = 0usize;
            while i < n && times[order[i]] == t {
                if events[order[i]] {
                    events_at_t += 1;
                } else {
                    censored_at_t += 1;
                }
                i += 1;
            }

            if events_at_t > 0 {
                knots.push(Knot {
                    time: t,
                    events: events_at_t,
                    censored_before: censored_accum,
                });
                censored_accum = censored_at_t;
            } else {
                censored_accum += censored_at_t;
            }
        }

        let n_events: usize = knots.iter().map(|k| k.events).sum();

        let mut steps = Vec::with_capacity(knots.len());
        let mut n_risk = n;
        let mut survival = 1.0;
        let mut greenwood_sum = 0.0;

        for knot in &knots {
            n_risk -= knot.censored_before;

            let d = knot.events;
            survival *= 1.0 - d as f64 / n_risk as f64;

            // greenwood term is skipped when the risk set is exhausted; the
            // curve hits exactly zero and the variance stops accumulating
            if n_risk > d {
                greenwood_sum += d as f64 / (n_risk as f64 * (n_risk - d) as f64);
            }

            let std_err = survival * greenwood_sum.sqrt();
            let (ci_lower, ci_upper) = loglog_ci(survival, greenwood_sum);

            steps.push(KaplanMeierStep {
                time: knot.time,
                n_risk,
                n_events: d,
                n_censored: knot.censored_before,
                survival,
                std_err,
                ci_lower,
                ci_upper,
            });

            n_risk -= d;
        }

        Ok(Self {
            steps,
            n_total: n,
            n_events,
            max_observed_time: data.max_observed_time(),
        })
    }

    /// curve knots in ascending time order
    pub fn steps(&self) -> &[KaplanMeierStep] {
        &self.steps
    }

    /// total number of observations
    pub fn n_total(&self) -> usize {
        self.n_total
    }

    /// total number of events
    pub fn n_events(&self) -> usize {
        self.n_events
    }

    /// largest observed duration; the curve is undefined past this
    pub fn max_observed_time(&self) -> f64 {
        self.max_observed_time
    }

    /// step value in force at time `t`
    ///
    /// right-continuous: the last knot with time <= t applies. S = 1 before
    /// the first knot. `None` past the last observed duration.
    pub fn survival_at(&self, t: f64) -> Option<f64> {
        if t > self.max_observed_time {
            return None;
        }
        let last_below = self
            .steps
            .iter()
            .take_while(|s| s.time <= t)
            .last();
        Some(last_below.map_or(1.0, |s| s.survival))
    }

    /// smallest event time at which the curve has dropped to or below 1 - p
    ///
    /// `Ok(None)` means the quantile was not reached (the curve never gets
    /// that low before censoring runs out) - it is not extrapolated.
    pub fn quantile(&self, p: f64) -> Result<Option<f64>> {
        if !(0.0..1.0).contains(&p) || p <= 0.0 {
            return Err(SurvivalError::invalid_parameter(
                "p",
                format!("{p} (must be in (0, 1))"),
            ));
        }
        let threshold = 1.0 - p;
        Ok(self
            .steps
            .iter()
            .find(|s| s.survival <= threshold)
            .map(|s| s.time))
    }

    /// median survival time, `None` if not reached
    pub fn median(&self) -> Option<f64> {
        self.steps.iter().find(|s| s.survival <= 0.5).map(|s| s.time)
    }

    /// 95% confidence bounds for the median (brookmeyer-crowley band
    /// intersection); either bound may be unestimable
    pub fn median_ci(&self) -> (Option<f64>, Option<f64>) {
        let lower = self
            .steps
            .iter()
            .find(|s| s.ci_lower <= 0.5)
            .map(|s| s.time);
        let upper = self
            .steps
            .iter()
            .find(|s| s.ci_upper <= 0.5)
            .map(|s| s.time);
        (lower, upper)
    }
}

/// 95% bounds computed on the log(-log S) scale and back-transformed,
/// which keeps them inside [0, 1] by construction
fn loglog_ci(survival: f64, greenwood_sum: f64) -> (f64, f64) {
    if survival <= 0.0 {
        return (0.0, 0.0);
    }
    if survival >= 1.0 {
        return (1.0, 1.0);
    }

    let theta = (-survival.ln()).ln();
    // SE on the log(-log S) scale: sqrt(greenwood) / |log S|
    let se_theta = if greenwood_sum > 0.0 {
        greenwood_sum.sqrt() / survival.ln().abs()
    } else {
        0.0
    };

    // bounds swap under the double log
    let lower = (-(theta + Z_95 * se_theta).exp()).exp();
    let upper = (-(theta - Z_95 * se_theta).exp()).exp();
    (lower.max(0.0), upper.min(1.0))
}
