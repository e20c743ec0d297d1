use thiserror::Error;

/// Errors produced by the calibration core.
///
/// `Configuration` and `Simulation` are fatal to a run; a failing
/// fitness evaluation is never an error (it becomes a penalty value,
/// see `fitness::PENALTY`).
#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("simulation failed for {run}: {reason}")]
    Simulation { run: String, reason: String },

    #[error("parameter {name}={value} outside bounds [{min}, {max}]")]
    OutOfBounds {
        name: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("unsupported fit method '{0}' (only 'evolve' is supported)")]
    UnsupportedMethod(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CalibrationError>;

impl CalibrationError {
    pub fn config(msg: impl Into<String>) -> Self {
        CalibrationError::Configuration(msg.into())
    }

    pub fn simulation(run: impl Into<String>, reason: impl Into<String>) -> Self {
        CalibrationError::Simulation {
            run: run.into(),
            reason: reason.into(),
        }
    }
}
