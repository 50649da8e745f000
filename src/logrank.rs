use ndarray::{Array1, Array2};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::{Result, SurvivalError};
use crate::linalg;

/// result of the k-group logrank test
#[derive(Debug, Clone)]
pub struct LogRankResult {
    /// chi-square statistic (quadratic form with hypergeometric covariance)
    pub statistic: f64,
    /// number of groups minus one
    pub degrees_of_freedom: usize,
    /// p-value from the chi-square distribution
    pub p_value: f64,
    /// number of groups compared
    pub n_groups: usize,
    /// observed events per group
    pub observed: Vec<f64>,
    /// expected events per group under the null
    pub expected: Vec<f64>,
    /// true when some group expects fewer than 5 events; the chi-square
    /// approximation is unreliable then and the p-value should be read
    /// with caution
    pub few_events: bool,
}

/// compare survival between k >= 2 groups with the logrank test
///
/// at each distinct pooled event time, events are allocated to groups in
/// proportion to their share of the risk set; the statistic is the quadratic
/// form of observed-minus-expected over the accumulated hypergeometric
/// covariance, chi-square distributed with k - 1 degrees of freedom under
/// the null of identical hazards.
pub fn log_rank_test(
    times: &[f64],
    events: &[bool],
    groups: &[usize],
) -> Result<LogRankResult> {
    let n = times.len();
    if n == 0 {
        return Err(SurvivalError::invalid_survival_data("empty sample"));
    }
    if events.len() != n || groups.len() != n {
        return Err(SurvivalError::invalid_dimensions(format!(
            "times ({}), events ({}), groups ({}) must have the same length",
            n,
            events.len(),
            groups.len()
        )));
    }
    if times.iter().any(|&t| t < 0.0 || !t.is_finite()) {
        return Err(SurvivalError::invalid_survival_data(
            "durations must be non-negative & finite",
        ));
    }

    let n_groups = groups.iter().max().map_or(0, |&g| g + 1);
    if n_groups < 2 {
        return Err(SurvivalError::invalid_parameter(
            "groups",
            "need at least 2 distinct groups",
        ));
    }
    for g in 0..n_groups {
        if !groups.contains(&g) {
            return Err(SurvivalError::invalid_parameter(
                "groups",
                format!("group {g} has no members - labels must be 0..k contiguous"),
            ));
        }
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| times[a].partial_cmp(&times[b]).unwrap());

    let mut risk_per_group = vec![0usize; n_groups];
    for &g in groups {
        risk_per_group[g] += 1;
    }

    let mut observed = vec![0.0; n_groups];
    let mut expected = vec![0.0; n_groups];
    // hypergeometric covariance of observed events, accumulated over times
    let mut cov = Array2::<f64>::zeros((n_groups, n_groups));

    let mut i = 0;
    while i < n {
        let t = times[order[i]];

        let mut d_total = 0usize;
        let mut d_per_group = vec![0usize; n_groups];
        let mut leaving_per_group = vec![0usize; n_groups];
        while i < n && times[order[i]] == t {
            let g = groups[order[i]];
            leaving_per_group[g] += 1;
            if events[order[i]] {
                d_total += 1;
                d_per_group[g] += 1;
            }
            i += 1;
        }

        let n_risk: usize = risk_per_group.iter().sum();
        if d_total > 0 && n_risk > 0 {
            let d = d_total as f64;
            let nr = n_risk as f64;

            for g in 0..n_groups {
                let share = risk_per_group[g] as f64 / nr;
                observed[g] += d_per_group[g] as f64;
                expected[g] += d * share;
            }

            if n_risk > 1 {
                let scale = d * (nr - d) / (nr - 1.0);
                for g in 0..n_groups {
                    let pg = risk_per_group[g] as f64 / nr;
                    for h in 0..n_groups {
                        let ph = risk_per_group[h] as f64 / nr;
                        let delta = if g == h { pg } else { 0.0 };
                        cov[[g, h]] += scale * (delta - pg * ph);
                    }
                }
            }
        }

        for g in 0..n_groups {
            risk_per_group[g] -= leaving_per_group[g];
        }
    }

    // quadratic form on the first k-1 groups (the last is determined by the
    // others since observed and expected totals agree)
    let k = n_groups - 1;
    let diff = Array1::from_iter((0..k).map(|g| observed[g] - expected[g]));
    let mut cov_sub = Array2::zeros((k, k));
    for g in 0..k {
        for h in 0..k {
            cov_sub[[g, h]] = cov[[g, h]];
        }
    }

    let solved = linalg::solve(&cov_sub, &diff).map_err(|_| {
        SurvivalError::numerical_error(
            "logrank covariance matrix is singular - too few events to compare groups",
        )
    })?;
    let statistic = diff.dot(&solved);

    let chi = ChiSquared::new(k as f64)
        .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;
    let p_value = 1.0 - chi.cdf(statistic);

    let few_events = expected.iter().any(|&e| e < 5.0);

    Ok(LogRankResult {
        statistic,
        degrees_of_freedom: k,
        p_value,
        n_groups,
        observed,
        expected,
        few_events,
    })
}
