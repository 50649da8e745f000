use ndarray::Array1;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::{
    data::SurvivalData,
    error::{Result, SurvivalError},
    kaplan_meier::KaplanMeierCurve,
    model::{CoxFit, ModelTest},
    optimization::PartialLikelihood,
};

/// per-covariate proportionality test
#[derive(Debug, Clone)]
pub struct CovariateTest {
    pub name: String,
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
}

/// result of the proportional-hazards assumption test
///
/// a small p-value means the covariate's effect drifts with time, which
/// contradicts the constant-hazard-ratio assumption the cox model rests on.
#[derive(Debug, Clone)]
pub struct ProportionalHazardsTest {
    pub per_covariate: Vec<CovariateTest>,
    pub global: ModelTest,
}

/// test the proportional-hazards assumption of a fitted cox model
///
/// schoenfeld residuals (observed covariate minus its risk-set weighted
/// expectation at each event) are correlated against transformed event
/// time; a real correlation means the coefficient is not constant in time.
/// the time transform is the kaplan-meier transform g(t) = 1 - S(t-) of
/// the pooled sample, used identically for the per-covariate and global
/// statistics (grambsch-therneau form).
pub fn proportional_hazards_test(
    fit: &CoxFit,
    data: &SurvivalData,
) -> Result<ProportionalHazardsTest> {
    let p = fit.coefficients.len();
    if data.n_features() != p {
        return Err(SurvivalError::invalid_dimensions(format!(
            "fit has {} covariates but data has {}",
            p,
            data.n_features()
        )));
    }

    let d = data.n_events();
    if d < 2 {
        return Err(SurvivalError::invalid_survival_data(
            "proportionality test needs at least 2 events",
        ));
    }

    let km = KaplanMeierCurve::fit(data)?;
    let likelihood = PartialLikelihood::new(data, fit.ties);
    let means = likelihood.risk_set_means(&fit.coefficients)?;

    // transform per event, plus the raw schoenfeld residuals. tied events
    // share the risk-set mean and the transform value.
    let x = data.covariates();
    let mut transforms: Vec<f64> = Vec::with_capacity(d);
    let mut residuals: Vec<Array1<f64>> = Vec::with_capacity(d);

    let mut prev_survival = 1.0;
    for (step, (_, subjects, mean)) in km.steps().iter().zip(means.iter()) {
        let g = 1.0 - prev_survival;
        prev_survival = step.survival;

        for &subj in subjects {
            transforms.push(g);
            residuals.push(&x.row(subj).to_owned() - mean);
        }
    }

    let g_bar: f64 = transforms.iter().sum::<f64>() / d as f64;
    let denom: f64 = transforms.iter().map(|g| (g - g_bar).powi(2)).sum();
    if denom <= 0.0 {
        return Err(SurvivalError::numerical_error(
            "all events share one time - transformed times have no spread",
        ));
    }

    let mut u = Array1::<f64>::zeros(p);
    for (g, r) in transforms.iter().zip(residuals.iter()) {
        u = u + (g - g_bar) * r;
    }

    let cov_u = fit.covariance.dot(&u);
    let d = d as f64;

    let chi1 = ChiSquared::new(1.0)
        .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;
    let mut per_covariate = Vec::with_capacity(p);
    for j in 0..p {
        let var = fit.covariance[[j, j]];
        if var <= 0.0 {
            return Err(SurvivalError::numerical_error(format!(
                "non-positive variance for covariate {j}"
            )));
        }
        let statistic = d * cov_u[j] * cov_u[j] / (var * denom);
        let name = match &fit.feature_names {
            Some(names) => names[j].clone(),
            None => format!("x{j}"),
        };
        per_covariate.push(CovariateTest {
            name,
            statistic,
            degrees_of_freedom: 1,
            p_value: 1.0 - chi1.cdf(statistic),
        });
    }

    let global_statistic = d * u.dot(&cov_u) / denom;
    let chi_p = ChiSquared::new(p as f64)
        .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;
    let global = ModelTest {
        statistic: global_statistic,
        degrees_of_freedom: p,
        p_value: 1.0 - chi_p.cdf(global_statistic),
    };

    Ok(ProportionalHazardsTest {
        per_covariate,
        global,
    })
}
