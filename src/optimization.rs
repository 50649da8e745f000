use ndarray::{Array1, Array2};
use crate::{
    data::SurvivalData,
    error::{Result, SurvivalError},
    linalg,
};

/// how tied event times enter the partial likelihood
///
/// efron's correction is the default; it is exact when ties are absent and
/// noticeably more accurate than breslow when they are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TiesMethod {
    #[default]
    Efron,
    Breslow,
}

/// newton-raphson settings for the partial-likelihood maximization
#[derive(Debug, Clone)]
pub struct NewtonConfig {
    /// hard stop on iterations; exhausting it is an error, not a best-effort
    pub max_iterations: usize,
    /// relative log-likelihood change (and newton step size) below which the
    /// fit counts as converged
    pub tolerance: f64,
    pub ties: TiesMethod,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-9,
            ties: TiesMethod::Efron,
        }
    }
}

/// log partial likelihood with its first two derivatives at a given beta
pub(crate) struct LikelihoodParts {
    pub log_likelihood: f64,
    /// score vector (gradient)
    pub score: Array1<f64>,
    /// observed information matrix (negative hessian)
    pub information: Array2<f64>,
}

/// outcome of a converged newton-raphson run
pub(crate) struct NewtonFit {
    pub beta: Array1<f64>,
    pub log_likelihood: f64,
    pub information: Array2<f64>,
    pub n_iterations: usize,
}

struct EventBlock {
    time: f64,
    /// subjects with an event at exactly this time
    subjects: Vec<usize>,
}

/// partial-likelihood evaluator over a fixed sample
///
/// risk sets are built by a single backward sweep over the time-sorted
/// sample, so each evaluation is O(n p^2) regardless of how the risk sets
/// overlap. censored subjects tied with an event time are still at risk
/// at that time.
pub(crate) struct PartialLikelihood<'a> {
    data: &'a SurvivalData,
    order: Vec<usize>,
    event_blocks: Vec<EventBlock>,
    ties: TiesMethod,
}

impl<'a> PartialLikelihood<'a> {
    pub fn new(data: &'a SurvivalData, ties: TiesMethod) -> Self {
        let order = data.sorted_indices();
        let times = data.times();
        let events = data.events();
        let n = data.n_samples();

        let mut event_blocks: Vec<EventBlock> = Vec::new();
        let mut i = 0;
        while i < n {
            let t = times[order[i]];
            let mut subjects = Vec::new();
            while i < n && times[order[i]] == t {
                if events[order[i]] {
                    subjects.push(order[i]);
                }
                i += 1;
            }
            if !subjects.is_empty() {
                event_blocks.push(EventBlock { time: t, subjects });
            }
        }

        Self {
            data,
            order,
            event_blocks,
            ties,
        }
    }

    /// log partial likelihood, score, and information at `beta`
    pub fn evaluate(&self, beta: &Array1<f64>) -> Result<LikelihoodParts> {
        let p = self.data.n_features();
        let x = self.data.covariates();
        let times = self.data.times();
        let n = self.data.n_samples();

        let mut ll = 0.0;
        let mut score = Array1::zeros(p);
        let mut info = Array2::zeros((p, p));

        // running risk-set moments, grown as the sweep moves to earlier times
        let mut s0 = 0.0;
        let mut s1 = Array1::<f64>::zeros(p);
        let mut s2 = Array2::<f64>::zeros((p, p));
        let mut right = n;

        for block in self.event_blocks.iter().rev() {
            while right > 0 && times[self.order[right - 1]] >= block.time {
                right -= 1;
                let subj = self.order[right];
                let row = x.row(subj);
                let eta = row.dot(beta);
                let w = eta.exp();
                if !w.is_finite() {
                    return Err(SurvivalError::numerical_error(format!(
                        "linear predictor overflow (eta = {eta}) - coefficients may be diverging"
                    )));
                }
                s0 += w;
                for j in 0..p {
                    s1[j] += w * row[j];
                    for k in 0..p {
                        s2[[j, k]] += w * row[j] * row[k];
                    }
                }
            }

            let d = block.subjects.len();

            // tie-block moments for the efron correction
            let mut t0 = 0.0;
            let mut t1 = Array1::<f64>::zeros(p);
            let mut t2 = Array2::<f64>::zeros((p, p));
            if self.ties == TiesMethod::Efron && d > 1 {
                for &subj in &block.subjects {
                    let row = x.row(subj);
                    let w = row.dot(beta).exp();
                    t0 += w;
                    for j in 0..p {
                        t1[j] += w * row[j];
                        for k in 0..p {
                            t2[[j, k]] += w * row[j] * row[k];
                        }
                    }
                }
            }

            for &subj in &block.subjects {
                let row = x.row(subj);
                ll += row.dot(beta);
                for j in 0..p {
                    score[j] += row[j];
                }
            }

            for l in 0..d {
                let frac = match self.ties {
                    TiesMethod::Efron => l as f64 / d as f64,
                    TiesMethod::Breslow => 0.0,
                };
                let denom = s0 - frac * t0;
                if denom <= 0.0 || !denom.is_finite() {
                    return Err(SurvivalError::numerical_error(
                        "risk set weight sum is non-positive",
                    ));
                }

                ll -= denom.ln();
                for j in 0..p {
                    let mean_j = (s1[j] - frac * t1[j]) / denom;
                    score[j] -= mean_j;
                    for k in 0..p {
                        let mean_k = (s1[k] - frac * t1[k]) / denom;
                        info[[j, k]] +=
                            (s2[[j, k]] - frac * t2[[j, k]]) / denom - mean_j * mean_k;
                    }
                }
            }
        }

        Ok(LikelihoodParts {
            log_likelihood: ll,
            score,
            information: info,
        })
    }

    /// per-event-time risk-set weighted covariate means under `beta`
    ///
    /// used for schoenfeld residuals; tied events at a time share the mean.
    pub fn risk_set_means(
        &self,
        beta: &Array1<f64>,
    ) -> Result<Vec<(f64, Vec<usize>, Array1<f64>)>> {
        let p = self.data.n_features();
        let x = self.data.covariates();
        let times = self.data.times();
        let n = self.data.n_samples();

        let mut s0 = 0.0;
        let mut s1 = Array1::<f64>::zeros(p);
        let mut right = n;
        let mut out: Vec<(f64, Vec<usize>, Array1<f64>)> =
            Vec::with_capacity(self.event_blocks.len());

        for block in self.event_blocks.iter().rev() {
            while right > 0 && times[self.order[right - 1]] >= block.time {
                right -= 1;
                let subj = self.order[right];
                let row = x.row(subj);
                let w = row.dot(beta).exp();
                if !w.is_finite() {
                    return Err(SurvivalError::numerical_error(
                        "linear predictor overflow in residual computation",
                    ));
                }
                s0 += w;
                for j in 0..p {
                    s1[j] += w * row[j];
                }
            }
            if s0 <= 0.0 {
                return Err(SurvivalError::numerical_error(
                    "risk set weight sum is non-positive",
                ));
            }
            out.push((block.time, block.subjects.clone(), &s1 / s0));
        }

        out.reverse();
        Ok(out)
    }
}

/// maximize the partial likelihood by newton-raphson with step-halving
///
/// starts at beta = 0. step-halving keeps the log-likelihood from going
/// backwards; convergence requires either a vanishing newton step or a
/// vanishing relative log-likelihood change. hitting the iteration cap is
/// a hard failure carrying the coordinate that was still moving.
pub(crate) fn newton_raphson(
    likelihood: &PartialLikelihood<'_>,
    config: &NewtonConfig,
    n_features: usize,
) -> Result<NewtonFit> {
    let mut beta: Array1<f64> = Array1::zeros(n_features);
    let mut parts = likelihood.evaluate(&beta)?;
    let mut last_delta: Array1<f64> = Array1::zeros(n_features);

    for iter in 1..=config.max_iterations {
        let delta = linalg::solve(&parts.information, &parts.score)?;

        let max_step = delta.iter().fold(0.0_f64, |m, d| m.max(d.abs()));
        if max_step < config.tolerance {
            return Ok(NewtonFit {
                beta,
                log_likelihood: parts.log_likelihood,
                information: parts.information,
                n_iterations: iter,
            });
        }

        // step-halving: never accept a step that worsens the likelihood
        let mut step = 1.0;
        let (new_beta, new_parts) = loop {
            let candidate = &beta + &(step * &delta);
            match likelihood.evaluate(&candidate) {
                Ok(p) if p.log_likelihood >= parts.log_likelihood - 1e-10 => {
                    break (candidate, p);
                }
                Ok(_) | Err(SurvivalError::NumericalError { .. }) if step > 1e-4 => {
                    step *= 0.5;
                }
                Ok(p) => break (candidate, p),
                Err(e) => return Err(e),
            }
        };

        let ll_change = (new_parts.log_likelihood - parts.log_likelihood).abs();
        let converged =
            ll_change < config.tolerance * (parts.log_likelihood.abs() + config.tolerance);

        beta = new_beta;
        parts = new_parts;
        last_delta = delta;

        if converged {
            return Ok(NewtonFit {
                beta,
                log_likelihood: parts.log_likelihood,
                information: parts.information,
                n_iterations: iter,
            });
        }
    }

    // report which coefficient was still on the move
    let coefficient = last_delta
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.abs().partial_cmp(&b.1.abs()).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0);
    Err(SurvivalError::NotConverged {
        iterations: config.max_iterations,
        coefficient,
        last_estimate: beta[coefficient],
    })
}
