use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("Invalid target type '{value}'. Use emulated_adapter, emulated_plc, physical or replay.")]
    InvalidTargetType { value: String },
    #[error("Invalid protocol profile '{value}'. Use standard or big_endian_vendor.")]
    InvalidProfile { value: String },
    #[error("Probability must be within [0, 1], got {value}.")]
    InvalidProbability { value: String },
    #[error("No subcommand given. Use `run` or `list`.")]
    MissingSubcommand,
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
