use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use crate::error::{Result, SurvivalError};

/// survival data - durations, event flags, and optional covariates
///
/// durations are time from origin to event or right-censoring, events are
/// the canonical boolean convention (true = event observed, false = censored).
/// rows with a missing (non-finite) covariate are dropped at construction and
/// counted in `n_dropped` - they are never imputed.
#[derive(Debug, Clone)]
pub struct SurvivalData {
    times: Array1<f64>,              // duration to event/censoring
    events: Array1<bool>,            // true = event, false = censored
    covariates: Array2<f64>,         // n_samples x n_features (may be n x 0)
    n_dropped: usize,                // rows removed for missing covariates
}

/// map a numeric event column onto the canonical boolean convention
///
/// three codings are accepted: {0 = censored, 1 = event} and
/// {1 = censored, 2 = event}. a column whose values all sit in {0, 1} is
/// read as 0/1 coding (so an all-ones column means all events); otherwise
/// values must all sit in {1, 2}. anything else is a schema error.
pub fn normalize_event_codes(codes: &[f64]) -> Result<Vec<bool>> {
    if codes.iter().any(|c| !c.is_finite()) {
        return Err(SurvivalError::unrecognized_event_coding(
            "event column contains non-finite values",
        ));
    }

    let zero_one = codes.iter().all(|&c| c == 0.0 || c == 1.0);
    if zero_one {
        return Ok(codes.iter().map(|&c| c == 1.0).collect());
    }

    let one_two = codes.iter().all(|&c| c == 1.0 || c == 2.0);
    if one_two {
        return Ok(codes.iter().map(|&c| c == 2.0).collect());
    }

    let bad = codes
        .iter()
        .find(|&&c| c != 0.0 && c != 1.0 && c != 2.0)
        .copied()
        .unwrap_or(f64::NAN);
    Err(SurvivalError::unrecognized_event_coding(format!(
        "event column mixes codings or contains unexpected value {bad} - expected {{0,1}} or {{1,2}}"
    )))
}

impl SurvivalData {
    /// make new survival data from raw vecs/arrays
    ///
    /// durations must be finite and non-negative. rows whose covariates
    /// contain NaN or infinity are dropped (see `n_dropped`).
    pub fn new(
        times: Vec<f64>,
        events: Vec<bool>,
        covariates: Array2<f64>,
    ) -> Result<Self> {
        let n_samples = times.len();

        if n_samples == 0 {
            return Err(SurvivalError::invalid_survival_data("empty sample"));
        }

        if events.len() != n_samples {
            return Err(SurvivalError::invalid_dimensions(format!(
                "times len ({}) != events len ({})",
                n_samples,
                events.len()
            )));
        }

        if covariates.nrows() != n_samples {
            return Err(SurvivalError::invalid_dimensions(format!(
                "covariates rows ({}) != n_samples ({})",
                covariates.nrows(),
                n_samples
            )));
        }

        if times.iter().any(|&t| t < 0.0 || !t.is_finite()) {
            return Err(SurvivalError::invalid_survival_data(
                "durations must be non-negative & finite",
            ));
        }

        // drop rows with missing covariates, keep the count
        let keep: Vec<usize> = (0..n_samples)
            .filter(|&i| covariates.row(i).iter().all(|v| v.is_finite()))
            .collect();
        let n_dropped = n_samples - keep.len();

        if keep.is_empty() {
            return Err(SurvivalError::invalid_survival_data(
                "every row has a missing covariate value",
            ));
        }

        let (times, events, covariates) = if n_dropped == 0 {
            (Array1::from(times), Array1::from(events), covariates)
        } else {
            let t: Vec<f64> = keep.iter().map(|&i| times[i]).collect();
            let e: Vec<bool> = keep.iter().map(|&i| events[i]).collect();
            let c = covariates.select(Axis(0), &keep);
            (Array1::from(t), Array1::from(e), c)
        };

        Ok(Self {
            times,
            events,
            covariates,
            n_dropped,
        })
    }

    /// survival data with no covariates (kaplan-meier / logrank input)
    pub fn without_covariates(times: Vec<f64>, events: Vec<bool>) -> Result<Self> {
        let n = times.len();
        Self::new(times, events, Array2::zeros((n, 0)))
    }

    /// build from a numeric event column in any of the accepted codings
    pub fn from_coded(
        times: Vec<f64>,
        event_codes: &[f64],
        covariates: Array2<f64>,
    ) -> Result<Self> {
        if event_codes.len() != times.len() {
            return Err(SurvivalError::invalid_dimensions(format!(
                "times len ({}) != event codes len ({})",
                times.len(),
                event_codes.len()
            )));
        }
        let events = normalize_event_codes(event_codes)?;
        Self::new(times, events, covariates)
    }

    /// how many subjects (after dropping incomplete rows)
    pub fn n_samples(&self) -> usize {
        self.times.len()
    }

    /// how many covariates per subject
    pub fn n_features(&self) -> usize {
        self.covariates.ncols()
    }

    /// how many rows were dropped for missing covariates
    pub fn n_dropped(&self) -> usize {
        self.n_dropped
    }

    /// how many events were observed
    pub fn n_events(&self) -> usize {
        self.events.iter().filter(|&&e| e).count()
    }

    /// durations to event/censoring
    pub fn times(&self) -> ArrayView1<'_, f64> {
        self.times.view()
    }

    /// event indicators (true = event, false = censored)
    pub fn events(&self) -> &[bool] {
        self.events.as_slice().unwrap()
    }

    /// covariate matrix
    pub fn covariates(&self) -> ArrayView2<'_, f64> {
        self.covariates.view()
    }

    /// indices ordered by duration ascending
    pub fn sorted_indices(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.n_samples()).collect();
        order.sort_by(|&a, &b| self.times[a].partial_cmp(&self.times[b]).unwrap());
        order
    }

    /// unique event times in ascending order
    pub fn event_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self
            .times
            .iter()
            .zip(self.events.iter())
            .filter_map(|(time, event)| if *event { Some(*time) } else { None })
            .collect();

        times.sort_by(|a, b| a.partial_cmp(b).unwrap());
        times.dedup();
        times
    }

    /// largest duration in the sample, event or censored
    ///
    /// the survival curve is undefined past this point.
    pub fn max_observed_time(&self) -> f64 {
        self.times.iter().copied().fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_data() -> SurvivalData {
        let times = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let events = vec![true, false, true, true, false];
        let covariates = Array2::from_shape_vec((5, 2), vec![
            1.0, 2.0,
            3.0, 4.0,
            5.0, 6.0,
            7.0, 8.0,
            9.0, 10.0,
        ]).unwrap();

        SurvivalData::new(times, events, covariates).unwrap()
    }

    #[test]
    fn test_survival_data_creation() {
        let data = create_test_data();
        assert_eq!(data.n_samples(), 5);
        assert_eq!(data.n_features(), 2);
        assert_eq!(data.n_events(), 3);
        assert_eq!(data.n_dropped(), 0);
        assert_eq!(data.event_times(), vec![1.0, 3.0, 4.0]);
        assert_eq!(data.max_observed_time(), 5.0);
    }

    #[test]
    fn test_invalid_dimensions() {
        let times = vec![1.0, 2.0];
        let events = vec![true]; // wrong length
        let covariates = Array2::zeros((2, 2));

        assert!(SurvivalData::new(times, events, covariates).is_err());
    }

    #[test]
    fn test_invalid_times() {
        let times = vec![-1.0, 2.0];
        let events = vec![true, false];
        let covariates = Array2::zeros((2, 2));

        assert!(SurvivalData::new(times, events, covariates).is_err());
    }

    #[test]
    fn test_zero_duration_allowed() {
        let data =
            SurvivalData::without_covariates(vec![0.0, 1.0], vec![true, true]).unwrap();
        assert_eq!(data.n_samples(), 2);
    }

    #[test]
    fn test_missing_covariates_dropped() {
        let times = vec![1.0, 2.0, 3.0, 4.0];
        let events = vec![true, true, false, true];
        let covariates = Array2::from_shape_vec((4, 2), vec![
            1.0, 2.0,
            f64::NAN, 4.0,
            5.0, 6.0,
            7.0, f64::INFINITY,
        ]).unwrap();

        let data = SurvivalData::new(times, events, covariates).unwrap();
        assert_eq!(data.n_samples(), 2);
        assert_eq!(data.n_dropped(), 2);
        assert_eq!(data.times()[0], 1.0);
        assert_eq!(data.times()[1], 3.0);
    }

    #[test]
    fn test_zero_one_coding() {
        let events = normalize_event_codes(&[1.0, 0.0, 1.0, 0.0]).unwrap();
        assert_eq!(events, vec![true, false, true, false]);
    }

    #[test]
    fn test_one_two_coding() {
        let events = normalize_event_codes(&[2.0, 1.0, 2.0, 2.0]).unwrap();
        assert_eq!(events, vec![true, false, true, true]);
    }

    #[test]
    fn test_all_ones_reads_as_zero_one() {
        // a column of all 1s fits both codings; 0/1 wins
        let events = normalize_event_codes(&[1.0, 1.0, 1.0]).unwrap();
        assert!(events.iter().all(|&e| e));
    }

    #[test]
    fn test_unrecognized_coding() {
        assert!(normalize_event_codes(&[0.0, 2.0]).is_err());
        assert!(normalize_event_codes(&[1.0, 3.0]).is_err());
        assert!(normalize_event_codes(&[0.5, 1.0]).is_err());
        assert!(normalize_event_codes(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_coding_round_trip() {
        let times = vec![3.0, 1.0, 4.0, 1.5];
        let covs = Array2::zeros((4, 0));

        let from_bool = SurvivalData::new(
            times.clone(),
            vec![true, false, true, false],
            covs.clone(),
        )
        .unwrap();
        let from_01 =
            SurvivalData::from_coded(times.clone(), &[1.0, 0.0, 1.0, 0.0], covs.clone())
                .unwrap();
        let from_12 =
            SurvivalData::from_coded(times.clone(), &[2.0, 1.0, 2.0, 1.0], covs).unwrap();

        for data in [&from_bool, &from_01, &from_12] {
            assert_eq!(data.times().to_vec(), times);
            assert_eq!(data.events(), &[true, false, true, false]);
        }
    }

    #[test]
    fn test_sorted_indices() {
        let data =
            SurvivalData::without_covariates(vec![3.0, 1.0, 2.0], vec![true, true, false])
                .unwrap();
        assert_eq!(data.sorted_indices(), vec![1, 2, 0]);
    }
}
