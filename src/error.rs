use thiserror::Error;

pub type Result<T> = std::result::Result<T, SurvivalError>;

#[derive(Error, Debug, Clone)]
pub enum SurvivalError {
    #[error("dimensions don't match: {message}")]
    InvalidDimensions { message: String },

    #[error("survival data is broken: {message}")]
    InvalidSurvivalData { message: String },

    #[error("unrecognized event coding: {message}")]
    UnrecognizedEventCoding { message: String },

    #[error("no events in the sample - nothing to estimate")]
    NoEvents,

    #[error("newton-raphson gave up after {iterations} iterations - coefficient {coefficient} was still moving (last estimate {last_estimate})")]
    NotConverged {
        iterations: usize,
        coefficient: usize,
        last_estimate: f64,
    },

    #[error("information matrix is singular at column {column} - covariates may be collinear")]
    SingularMatrix { column: usize },

    #[error("bad parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    #[error("numerical issues: {message}")]
    NumericalError { message: String },
}

impl SurvivalError {
    pub fn invalid_dimensions(message: impl Into<String>) -> Self {
        Self::InvalidDimensions { message: message.into() }
    }

    pub fn invalid_survival_data(message: impl Into<String>) -> Self {
        Self::InvalidSurvivalData { message: message.into() }
    }

    pub fn unrecognized_event_coding(message: impl Into<String>) -> Self {
        Self::UnrecognizedEventCoding { message: message.into() }
    }

    pub fn invalid_parameter(parameter: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.into(),
        }
    }

    pub fn numerical_error(message: impl Into<String>) -> Self {
        Self::NumericalError { message: message.into() }
    }
}
