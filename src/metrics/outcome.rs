//! Outcome classification by error text and status byte.
//!
//! The substring rules are deliberately simple and must stay stable: report
//! consumers compare counts across runs and tool versions. Matching is
//! case-sensitive on the lowercase markers.
use super::types::Outcome;

const TIMEOUT_MARKER: &str = "timeout";
const CONNECTION_MARKER: &str = "connection";

#[must_use]
pub fn classify_outcome(error: &str, status: u8) -> Outcome {
    if !error.is_empty() {
        if is_timeout(error) {
            return Outcome::Timeout;
        }
        return Outcome::Error;
    }
    if status != 0 {
        return Outcome::Error;
    }
    Outcome::Success
}

#[must_use]
pub fn is_timeout(error: &str) -> bool {
    error.contains(TIMEOUT_MARKER)
}

#[must_use]
pub fn is_connection_failure(error: &str) -> bool {
    error.contains(CONNECTION_MARKER)
}
