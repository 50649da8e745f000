//! # survkit
//!
//! survival analysis toolkit - kaplan-meier curves, logrank tests, and cox
//! proportional hazards, the way a clinical statistician expects them
//!
//! ## what you get
//!
//! - kaplan-meier estimation w/ greenwood errors & log(-log) confidence bands
//! - median / quantile queries that say "not reached" instead of guessing
//! - k-group logrank test w/ proper hypergeometric covariance
//! - cox regression (efron ties by default) w/ the full inference table:
//!   standard errors, hazard ratios, LR / wald / score tests, concordance
//! - schoenfeld-residual check of the proportional-hazards assumption
//!
//! every estimator is a pure function of its input: you get back an
//! immutable result value, and a failed fit never poisons the next one
//!
//! ## quick start
//!
//! ```rust
//! use survkit::{CoxModel, KaplanMeierCurve, SurvivalData};
//! use ndarray::Array2;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // follow-up times, event flags (true = event, false = censored),
//! // and one covariate per subject
//! let times = vec![1.0, 2.0, 4.0, 5.0, 3.0, 6.0, 7.0, 8.0];
//! let events = vec![true, true, true, false, true, true, true, false];
//! let covariates = Array2::from_shape_vec((8, 1), vec![
//!     0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0,
//! ])?;
//! let data = SurvivalData::new(times, events, covariates)?;
//!
//! // non-parametric curve
//! let km = KaplanMeierCurve::fit(&data)?;
//! println!("median survival: {:?}", km.median());
//!
//! // semi-parametric regression
//! let fit = CoxModel::new().fit(&data)?;
//! println!("hazard ratio: {:.3}", fit.hazard_ratios[0]);
//! # Ok(())
//! # }
//! ```

pub mod data;
pub mod diagnostics;
pub mod error;
pub mod kaplan_meier;
mod linalg;
pub mod logrank;
pub mod metrics;
pub mod model;
pub mod optimization;

pub use data::{normalize_event_codes, SurvivalData};
pub use diagnostics::{proportional_hazards_test, CovariateTest, ProportionalHazardsTest};
pub use error::{Result, SurvivalError};
pub use kaplan_meier::{KaplanMeierCurve, KaplanMeierStep};
pub use logrank::{log_rank_test, LogRankResult};
pub use metrics::concordance_index;
pub use model::{CoxFit, CoxModel, ModelTest};
pub use optimization::TiesMethod;

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_basic_functionality() {
        let times = vec![1.0, 2.0, 3.0, 4.0];
        let events = vec![true, false, true, true];
        let covariates = Array2::zeros((4, 2));

        let data = SurvivalData::new(times, events, covariates).unwrap();
        assert_eq!(data.n_samples(), 4);
        assert_eq!(data.n_features(), 2);
        assert_eq!(data.n_events(), 3);

        let km = KaplanMeierCurve::fit(&data).unwrap();
        assert_eq!(km.steps().len(), 3);
    }
}
