//! JSON wire shapes of the ingestion boundary.
//!
//! A batch is an array of `{"timestamp": <int>, "value": <number>}` in stream
//! units (nanoseconds); `"data"` is accepted for `"value"`. A frame maps series
//! names to batches, e.g. `{"a": [...], "b": [...]}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::chart::Sample;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("malformed sample json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
struct WireSample {
    timestamp: i64,
    #[serde(alias = "data")]
    value: f64,
}

impl From<WireSample> for Sample {
    fn from(w: WireSample) -> Self {
        Sample::new(w.timestamp, w.value)
    }
}

impl From<&Sample> for WireSample {
    fn from(s: &Sample) -> Self {
        Self {
            timestamp: s.timestamp,
            value: s.value,
        }
    }
}

/// Series name to batch, ordered by name.
pub type Frame = BTreeMap<String, Vec<Sample>>;

pub fn decode_batch(json: &str) -> Result<Vec<Sample>, WireError> {
    let wire: Vec<WireSample> = serde_json::from_str(json)?;
    Ok(wire.into_iter().map(Sample::from).collect())
}

pub fn decode_frame(json: &str) -> Result<Frame, WireError> {
    let wire: BTreeMap<String, Vec<WireSample>> = serde_json::from_str(json)?;
    Ok(wire
        .into_iter()
        .map(|(name, batch)| (name, batch.into_iter().map(Sample::from).collect()))
        .collect())
}

pub fn encode_frame(frame: &Frame) -> Result<String, WireError> {
    let wire: BTreeMap<&str, Vec<WireSample>> = frame
        .iter()
        .map(|(name, batch)| (name.as_str(), batch.iter().map(WireSample::from).collect()))
        .collect();
    Ok(serde_json::to_string(&wire)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_accepts_value_and_data_fields() {
        let batch = decode_batch(r#"[{"timestamp": 1, "value": 0.5}, {"timestamp": 2, "data": -1}]"#)
            .unwrap();
        assert_eq!(batch, vec![Sample::new(1, 0.5), Sample::new(2, -1.0)]);
    }

    #[test]
    fn empty_batch_decodes_to_nothing() {
        assert!(decode_batch("[]").unwrap().is_empty());
    }

    #[test]
    fn frame_maps_names_to_batches() {
        let frame = decode_frame(
            r#"{"a": [{"timestamp": 10, "data": 1.0}], "b": [], "c": [{"timestamp": 11, "value": 2.0}]}"#,
        )
        .unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame["a"], vec![Sample::new(10, 1.0)]);
        assert!(frame["b"].is_empty());
        assert_eq!(frame["c"], vec![Sample::new(11, 2.0)]);
    }

    #[test]
    fn encoded_frame_decodes_back() {
        let mut frame = Frame::new();
        frame.insert("sin".into(), vec![Sample::new(1_000, 0.25), Sample::new(2_000, -0.5)]);
        let json = encode_frame(&frame).unwrap();
        assert!(json.contains(r#""value":0.25"#), "{json}");
        assert_eq!(decode_frame(&json).unwrap(), frame);
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(matches!(decode_batch(r#"[{"timestamp": "soon"}]"#), Err(WireError::Json(_))));
        assert!(decode_frame("[1, 2]").is_err());
    }
}
