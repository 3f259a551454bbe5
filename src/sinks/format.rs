use std::borrow::Cow;
use std::fmt::Write as _;

use chrono::SecondsFormat;

use crate::error::SinkError;
use crate::metrics::Metric;

pub(super) const METRIC_COLUMNS: [&str; 13] = [
    "timestamp",
    "scenario",
    "target_type",
    "operation",
    "target_name",
    "service_code",
    "success",
    "rtt_ms",
    "jitter_ms",
    "status",
    "error",
    "outcome",
    "expected_outcome",
];

/// Quotes a field when it carries a delimiter, a quote or a line break.
pub(super) fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

pub(super) fn write_row<I, S>(output: &mut String, fields: I) -> Result<(), SinkError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for (idx, field) in fields.into_iter().enumerate() {
        if idx > 0 {
            output.push(',');
        }
        output.push_str(&csv_field(field.as_ref()));
    }
    writeln!(output).map_err(|err| SinkError::WriteLine { source: err })
}

pub(super) fn timestamp(metric: &Metric) -> String {
    metric.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(super) fn millis(value: f64) -> String {
    format!("{:.3}", value)
}

/// Milliseconds rounded to whole microseconds.
pub(super) fn round_micros(value_ms: f64) -> f64 {
    (value_ms * 1_000.0).round() / 1_000.0
}

pub(super) fn metric_fields(metric: &Metric) -> [String; 13] {
    [
        timestamp(metric),
        metric.scenario.clone(),
        metric.target_type.as_str().to_owned(),
        metric.operation.as_str().to_owned(),
        metric.target_name.clone(),
        metric.service_code.clone(),
        metric.success.to_string(),
        millis(metric.rtt_ms),
        millis(metric.jitter_ms),
        metric.status.to_string(),
        metric.error.clone(),
        metric.outcome.as_str().to_owned(),
        metric
            .expected_outcome
            .map_or_else(String::new, |expected| expected.as_str().to_owned()),
    ]
}
