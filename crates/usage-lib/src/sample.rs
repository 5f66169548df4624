//! Parsing of Prometheus instant-vector samples
//!
//! A sample arrives as a two element JSON array `[<unix time>, "<value>"]`.
//! The value is always string encoded so that `NaN` and `+Inf` survive JSON.

use serde_json::Value;

use crate::error::{Result, UsageError};

/// Extract the numeric value of a `[timestamp, "value"]` sample.
///
/// Returns [`UsageError::MalformedSample`] when the tuple is too short, the
/// value is not a JSON string, or the string is not a base-10 float.
pub fn parse_sample(sample: &[Value]) -> Result<f64> {
    if sample.len() < 2 {
        return Err(UsageError::MalformedSample(format!(
            "expected [timestamp, value], got {} element(s)",
            sample.len()
        )));
    }

    let raw = sample[1]
        .as_str()
        .ok_or_else(|| UsageError::MalformedSample(format!("value is not a string: {}", sample[1])))?;

    raw
        .parse::<f64>()
        .map_err(|e| UsageError::MalformedSample(format!("value {raw:?} is not a number: {e}")))
}
