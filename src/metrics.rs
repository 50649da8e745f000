use ndarray::ArrayView1;
use crate::error::{Result, SurvivalError};

/// harrell's concordance - how often does a higher risk score go with a
/// shorter observed survival?
///
/// only comparable pairs count: the anchor must be an event, and the other
/// subject must be known to have survived past it (a later time, or a
/// censoring at/after it). pairs whose ordering censoring leaves undecided
/// are excluded rather than guessed. tied risk scores contribute half.
pub fn concordance_index(
    risk_scores: ArrayView1<f64>,
    times: ArrayView1<f64>,
    events: &[bool],
) -> Result<f64> {
    let n = risk_scores.len();
    if n != times.len() || n != events.len() {
        return Err(SurvivalError::invalid_dimensions(
            "risk scores, times, and events must have same length",
        ));
    }
    if n < 2 {
        return Err(SurvivalError::invalid_dimensions(
            "need at least 2 subjects for concordance",
        ));
    }

    let mut concordant = 0.0;
    let mut discordant = 0.0;
    let mut tied_risk = 0.0;

    for i in 0..n {
        if !events[i] {
            continue;
        }

        for j in 0..n {
            if i == j {
                continue;
            }

            // j outlived i (event later, or censored at/after i's event)
            if times[j] > times[i] || (!events[j] && times[j] >= times[i]) {
                if risk_scores[i] > risk_scores[j] {
                    concordant += 1.0;
                } else if risk_scores[i] < risk_scores[j] {
                    discordant += 1.0;
                } else {
                    tied_risk += 1.0;
                }
            }
        }
    }

    let comparable = concordant + discordant + tied_risk;
    if comparable == 0.0 {
        return Err(SurvivalError::numerical_error(
            "no comparable pairs for concordance",
        ));
    }

    Ok((concordant + 0.5 * tied_risk) / comparable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    #[test]
    fn test_perfect_concordance() {
        let times = Array1::from(vec![1.0, 2.0, 3.0, 4.0]);
        let events = vec![true; 4];
        // risk perfectly anti-correlated with survival
        let risk = Array1::from(vec![4.0, 3.0, 2.0, 1.0]);

        let c = concordance_index(risk.view(), times.view(), &events).unwrap();
        assert_relative_eq!(c, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_perfect_discordance() {
        let times = Array1::from(vec![1.0, 2.0, 3.0, 4.0]);
        let events = vec![true; 4];
        let risk = Array1::from(vec![1.0, 2.0, 3.0, 4.0]);

        let c = concordance_index(risk.view(), times.view(), &events).unwrap();
        assert_relative_eq!(c, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_all_tied_scores_give_half() {
        let times = Array1::from(vec![1.0, 2.0, 3.0, 4.0]);
        let events = vec![true; 4];
        let risk = Array1::from(vec![0.5, 0.5, 0.5, 0.5]);

        let c = concordance_index(risk.view(), times.view(), &events).unwrap();
        assert_relative_eq!(c, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_censoring_excludes_undetermined_pairs() {
        // subject 0 censored at t=1: it anchors no pairs, and only pairs
        // where the other subject is known to outlive an event remain
        let times = Array1::from(vec![1.0, 2.0, 3.0]);
        let events = vec![false, true, true];
        let risk = Array1::from(vec![9.0, 2.0, 1.0]);

        // comparable pairs: (1,2) only; concordant
        let c = concordance_index(risk.view(), times.view(), &events).unwrap();
        assert_relative_eq!(c, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_no_comparable_pairs() {
        let times = Array1::from(vec![1.0, 2.0]);
        let events = vec![false, false];
        let risk = Array1::from(vec![0.1, 0.2]);

        assert!(concordance_index(risk.view(), times.view(), &events).is_err());
    }

    #[test]
    fn test_dimension_mismatch() {
        let risk = Array1::from(vec![1.0, 2.0]);
        let times = Array1::from(vec![1.0, 2.0, 3.0]);
        let events = vec![true, false];

        assert!(concordance_index(risk.view(), times.view(), &events).is_err());
    }
}
