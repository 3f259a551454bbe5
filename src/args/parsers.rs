use std::time::Duration;

use crate::config::parse_duration_value;
use crate::error::ValidationError;

pub(crate) fn parse_duration_arg(s: &str) -> Result<Duration, ValidationError> {
    parse_duration_value(s)
}

pub(crate) fn parse_probability(s: &str) -> Result<f64, ValidationError> {
    let value: f64 = s
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidProbability {
            value: s.to_owned(),
        })?;
    check_probability(value)
}

pub(crate) fn check_probability(value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::InvalidProbability {
            value: value.to_string(),
        })
    }
}
