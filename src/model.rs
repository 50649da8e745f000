use ndarray::{Array1, Array2, ArrayView2};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};

use crate::{
    data::SurvivalData,
    error::{Result, SurvivalError},
    linalg, metrics,
    optimization::{newton_raphson, NewtonConfig, PartialLikelihood, TiesMethod},
};

/// an overall model test (likelihood ratio, wald, or score)
#[derive(Debug, Clone)]
pub struct ModelTest {
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
}

/// cox proportional hazards model builder
///
/// configure, then call `fit` - fitting returns an immutable `CoxFit`
/// value and leaves the builder untouched, so one builder can serve many
/// independent fits.
#[derive(Debug, Clone)]
pub struct CoxModel {
    ties: TiesMethod,
    max_iterations: usize,
    tolerance: f64,
    feature_names: Option<Vec<String>>,
}

impl Default for CoxModel {
    fn default() -> Self {
        let config = NewtonConfig::default();
        Self {
            ties: config.ties,
            max_iterations: config.max_iterations,
            tolerance: config.tolerance,
            feature_names: None,
        }
    }
}

impl CoxModel {
    /// new cox model w/ defaults (efron ties, 20 iterations, tol 1e-9)
    pub fn new() -> Self {
        Self::default()
    }

    /// tie handling method (efron is the default and the better choice)
    pub fn with_ties(mut self, ties: TiesMethod) -> Self {
        self.ties = ties;
        self
    }

    /// iteration cap - a hard stop, exceeding it fails the fit
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// relative log-likelihood change that counts as converged
    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    /// give names to your covariates for nicer output
    pub fn with_feature_names(mut self, names: Vec<String>) -> Self {
        self.feature_names = Some(names);
        self
    }

    /// maximize the partial likelihood and assemble the full fit result
    pub fn fit(&self, data: &SurvivalData) -> Result<CoxFit> {
        let p = data.n_features();
        if p == 0 {
            return Err(SurvivalError::invalid_dimensions(
                "cox model needs at least one covariate",
            ));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != p {
                return Err(SurvivalError::invalid_dimensions(format!(
                    "{} feature names for {} covariates",
                    names.len(),
                    p
                )));
            }
        }

        let n_events = data.n_events();
        if n_events == 0 {
            return Err(SurvivalError::NoEvents);
        }

        let likelihood = PartialLikelihood::new(data, self.ties);

        // null model quantities; the score test only needs these
        let null = likelihood.evaluate(&Array1::zeros(p))?;
        let score_direction = linalg::solve(&null.information, &null.score)?;
        let score_statistic = null.score.dot(&score_direction);

        let config = NewtonConfig {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            ties: self.ties,
        };
        let newton = newton_raphson(&likelihood, &config, p)?;

        let covariance = linalg::invert(&newton.information)?;

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;
        let z_crit = normal.inverse_cdf(0.975);

        let beta = newton.beta;
        let mut std_errors = Array1::zeros(p);
        let mut z_values = Array1::zeros(p);
        let mut p_values = Array1::zeros(p);
        let mut hazard_ratios = Array1::zeros(p);
        let mut hr_ci_lower = Array1::zeros(p);
        let mut hr_ci_upper = Array1::zeros(p);

        for j in 0..p {
            let var = covariance[[j, j]];
            let se = if var > 0.0 { var.sqrt() } else { 0.0 };
            let z = if se > 0.0 { beta[j] / se } else { 0.0 };

            std_errors[j] = se;
            z_values[j] = z;
            p_values[j] = 2.0 * (1.0 - normal.cdf(z.abs()));
            hazard_ratios[j] = beta[j].exp();
            hr_ci_lower[j] = (beta[j] - z_crit * se).exp();
            hr_ci_upper[j] = (beta[j] + z_crit * se).exp();
        }

        let chi = ChiSquared::new(p as f64)
            .map_err(|e| SurvivalError::numerical_error(e.to_string()))?;
        let make_test = |statistic: f64| ModelTest {
            statistic,
            degrees_of_freedom: p,
            p_value: 1.0 - chi.cdf(statistic),
        };

        let lr_statistic = (2.0 * (newton.log_likelihood - null.log_likelihood)).max(0.0);
        let wald_statistic = beta.dot(&newton.information.dot(&beta));

        let linear_predictors = data.covariates().dot(&beta);
        let concordance = metrics::concordance_index(
            linear_predictors.view(),
            data.times(),
            data.events(),
        )?;

        Ok(CoxFit {
            coefficients: beta,
            covariance,
            std_errors,
            z_values,
            p_values,
            hazard_ratios,
            hr_ci_lower,
            hr_ci_upper,
            log_likelihood: newton.log_likelihood,
            null_log_likelihood: null.log_likelihood,
            likelihood_ratio_test: make_test(lr_statistic),
            wald_test: make_test(wald_statistic),
            score_test: make_test(score_statistic),
            concordance,
            n_observations: data.n_samples(),
            n_events,
            n_dropped: data.n_dropped(),
            n_iterations: newton.n_iterations,
            ties: self.ties,
            feature_names: self.feature_names.clone(),
        })
    }
}

/// immutable result of a cox fit
///
/// everything is computed once at fit time; there is no shared session
/// state, so results from simultaneous fits never interfere.
#[derive(Debug, Clone)]
pub struct CoxFit {
    /// fitted coefficients (betas)
    pub coefficients: Array1<f64>,
    /// inverse of the observed information at convergence
    pub covariance: Array2<f64>,
    /// sqrt of the covariance diagonal
    pub std_errors: Array1<f64>,
    /// wald z per coefficient (beta / se)
    pub z_values: Array1<f64>,
    /// two-sided p per coefficient from the standard normal
    pub p_values: Array1<f64>,
    /// exp(beta)
    pub hazard_ratios: Array1<f64>,
    /// lower 95% bound for the hazard ratio
    pub hr_ci_lower: Array1<f64>,
    /// upper 95% bound for the hazard ratio
    pub hr_ci_upper: Array1<f64>,
    /// log partial likelihood at convergence
    pub log_likelihood: f64,
    /// log partial likelihood at beta = 0
    pub null_log_likelihood: f64,
    pub likelihood_ratio_test: ModelTest,
    pub wald_test: ModelTest,
    pub score_test: ModelTest,
    /// harrell's concordance of the linear predictor on the training data
    pub concordance: f64,
    /// rows used in the fit (after dropping incomplete ones)
    pub n_observations: usize,
    pub n_events: usize,
    /// rows dropped for missing covariate values
    pub n_dropped: usize,
    pub n_iterations: usize,
    pub ties: TiesMethod,
    pub feature_names: Option<Vec<String>>,
}

impl CoxFit {
    /// linear predictor (risk score) for new covariate rows
    pub fn predict(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        if covariates.ncols() != self.coefficients.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "feature count mismatch: expected {}, got {}",
                self.coefficients.len(),
                covariates.ncols()
            )));
        }
        Ok(covariates.dot(&self.coefficients))
    }

    /// hazard ratio relative to the baseline for new covariate rows
    pub fn predict_hazard_ratios(&self, covariates: ArrayView2<f64>) -> Result<Array1<f64>> {
        Ok(self.predict(covariates)?.mapv(f64::exp))
    }

    fn feature_name(&self, j: usize) -> String {
        match &self.feature_names {
            Some(names) => names[j].clone(),
            None => format!("x{j}"),
        }
    }

    /// print a coefficient table and the overall tests
    pub fn print_summary(&self) {
        println!("cox proportional hazards fit");
        println!("============================");
        println!(
            "n = {} ({} events, {} rows dropped for missing covariates)",
            self.n_observations, self.n_events, self.n_dropped
        );
        println!(
            "log-likelihood {:.4} (null {:.4}), {} iterations",
            self.log_likelihood, self.null_log_likelihood, self.n_iterations
        );
        println!();
        println!(
            "{:<16} {:>10} {:>10} {:>8} {:>10} {:>8} {:>8} {:>8}",
            "covariate", "coef", "se", "z", "p", "HR", "lo95", "hi95"
        );
        for j in 0..self.coefficients.len() {
            println!(
                "{:<16} {:>10.5} {:>10.5} {:>8.3} {:>10.5} {:>8.4} {:>8.4} {:>8.4}",
                self.feature_name(j),
                self.coefficients[j],
                self.std_errors[j],
                self.z_values[j],
                self.p_values[j],
                self.hazard_ratios[j],
                self.hr_ci_lower[j],
                self.hr_ci_upper[j],
            );
        }
        println!();
        for (name, test) in [
            ("likelihood ratio", &self.likelihood_ratio_test),
            ("wald", &self.wald_test),
            ("score (logrank)", &self.score_test),
        ] {
            println!(
                "{:<16} chi2 = {:.4} on {} df, p = {:.5}",
                name, test.statistic, test.degrees_of_freedom, test.p_value
            );
        }
        println!("concordance = {:.4}", self.concordance);
    }
}
