//! Telemetry payload validation.
//!
//! Raw payloads are parsed into [`Ingested`]: either a normalized
//! [`TelemetryReading`] or a [`MalformedTelemetry`] carrying the reason it was
//! rejected. Nothing untyped crosses this boundary.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::lane::Lane;
use crate::transport::parse_telemetry_topic;

/// A validated sensor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryReading {
    pub intersection_id: String,
    pub lane: Lane,
    /// Occupancy estimate in `[0, 100]`.
    pub density_pct: f64,
    pub queue_len: u64,
    pub seq: u64,
    /// Sender-reported creation time, Unix seconds.
    pub ts: f64,
}

/// Why a payload was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedReason {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload is not a JSON object")]
    NotAnObject,

    #[error("missing field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' has the wrong type (expected {expected})")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("intersection_id is empty")]
    EmptyIntersection,

    #[error("unknown intersection '{0}'")]
    UnknownIntersection(String),

    #[error("unknown lane '{0}'")]
    UnknownLane(String),

    #[error("density_pct {0} outside [0, 100]")]
    DensityOutOfRange(f64),

    #[error("queue_len must be a non-negative integer")]
    InvalidQueueLen,

    #[error("seq must be a non-negative integer")]
    InvalidSeq,

    #[error("ts {0} is not a plausible Unix timestamp")]
    ImplausibleTimestamp(f64),

    #[error("topic '{0}' is not a telemetry channel")]
    BadTopic(String),

    #[error("topic addresses {topic_intersection}/{topic_lane} but payload says {payload_intersection}/{payload_lane}")]
    TopicMismatch {
        topic_intersection: String,
        topic_lane: String,
        payload_intersection: String,
        payload_lane: String,
    },
}

impl MalformedReason {
    /// Short, stable label for counters and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            MalformedReason::InvalidJson(_) => "invalid_json",
            MalformedReason::NotAnObject => "not_an_object",
            MalformedReason::MissingField(_) => "missing_field",
            MalformedReason::WrongType { .. } => "wrong_type",
            MalformedReason::EmptyIntersection => "empty_intersection",
            MalformedReason::UnknownIntersection(_) => "unknown_intersection",
            MalformedReason::UnknownLane(_) => "unknown_lane",
            MalformedReason::DensityOutOfRange(_) => "density_out_of_range",
            MalformedReason::InvalidQueueLen => "invalid_queue_len",
            MalformedReason::InvalidSeq => "invalid_seq",
            MalformedReason::ImplausibleTimestamp(_) => "implausible_ts",
            MalformedReason::BadTopic(_) => "bad_topic",
            MalformedReason::TopicMismatch { .. } => "topic_mismatch",
        }
    }
}

/// A rejected message.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedTelemetry {
    pub topic: String,
    pub reason: MalformedReason,
}

/// Result of validating one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    Valid(TelemetryReading),
    Malformed(MalformedTelemetry),
}

/// Validate a telemetry message received on `topic`.
///
/// `is_known` decides whether an intersection id is configured.
pub fn parse_telemetry(topic: &str, payload: &[u8], is_known: impl Fn(&str) -> bool) -> Ingested {
    match validate(topic, payload, is_known) {
        Ok(reading) => Ingested::Valid(reading),
        Err(reason) => Ingested::Malformed(MalformedTelemetry {
            topic: topic.to_string(),
            reason,
        }),
    }
}

fn validate(
    topic: &str,
    payload: &[u8],
    is_known: impl Fn(&str) -> bool,
) -> Result<TelemetryReading, MalformedReason> {
    let (topic_intersection, topic_lane) =
        parse_telemetry_topic(topic).ok_or_else(|| MalformedReason::BadTopic(topic.to_string()))?;

    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| MalformedReason::InvalidJson(e.to_string()))?;
    let object = value.as_object().ok_or(MalformedReason::NotAnObject)?;

    let intersection_id = string_field(object, "intersection_id")?;
    if intersection_id.is_empty() {
        return Err(MalformedReason::EmptyIntersection);
    }
    if !is_known(intersection_id) {
        return Err(MalformedReason::UnknownIntersection(intersection_id.to_string()));
    }

    let lane_name = string_field(object, "lane")?;
    let lane: Lane = lane_name
        .parse()
        .map_err(|_| MalformedReason::UnknownLane(lane_name.to_string()))?;

    if topic_intersection != intersection_id || topic_lane != lane_name {
        return Err(MalformedReason::TopicMismatch {
            topic_intersection: topic_intersection.to_string(),
            topic_lane: topic_lane.to_string(),
            payload_intersection: intersection_id.to_string(),
            payload_lane: lane_name.to_string(),
        });
    }

    let density_pct = number_field(object, "density_pct")?;
    if !density_pct.is_finite() || !(0.0..=100.0).contains(&density_pct) {
        return Err(MalformedReason::DensityOutOfRange(density_pct));
    }

    let queue_len = unsigned_field(object, "queue_len", MalformedReason::InvalidQueueLen)?;
    let seq = unsigned_field(object, "seq", MalformedReason::InvalidSeq)?;

    let ts = number_field(object, "ts")?;
    if !ts.is_finite() || ts < 0.0 {
        return Err(MalformedReason::ImplausibleTimestamp(ts));
    }

    Ok(TelemetryReading {
        intersection_id: intersection_id.to_string(),
        lane,
        density_pct,
        queue_len,
        seq,
        ts,
    })
}

fn field<'a>(object: &'a Map<String, Value>, name: &'static str) -> Result<&'a Value, MalformedReason> {
    match object.get(name) {
        None | Some(Value::Null) => Err(MalformedReason::MissingField(name)),
        Some(value) => Ok(value),
    }
}

fn string_field<'a>(object: &'a Map<String, Value>, name: &'static str) -> Result<&'a str, MalformedReason> {
    field(object, name)?.as_str().ok_or(MalformedReason::WrongType {
        field: name,
        expected: "string",
    })
}

fn number_field(object: &Map<String, Value>, name: &'static str) -> Result<f64, MalformedReason> {
    field(object, name)?.as_f64().ok_or(MalformedReason::WrongType {
        field: name,
        expected: "number",
    })
}

/// Accepts JSON integers >= 0; rejects negatives and fractional numbers.
fn unsigned_field(
    object: &Map<String, Value>,
    name: &'static str,
    invalid: MalformedReason,
) -> Result<u64, MalformedReason> {
    let value = field(object, name)?;
    if !value.is_number() {
        return Err(MalformedReason::WrongType {
            field: name,
            expected: "integer",
        });
    }
    value.as_u64().ok_or(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOPIC: &str = "traffic/intersection_1/north/density";

    fn known(id: &str) -> bool {
        id == "intersection_1"
    }

    fn payload(overrides: Value) -> Vec<u8> {
        let mut base = json!({
            "intersection_id": "intersection_1",
            "lane": "north",
            "density_pct": 42.5,
            "queue_len": 8,
            "seq": 17,
            "ts": 1_700_000_000.25
        });
        let fields = overrides.as_object().unwrap();
        for (k, v) in fields {
            if v.is_null() {
                base.as_object_mut().unwrap().remove(k);
            } else {
                base[k] = v.clone();
            }
        }
        serde_json::to_vec(&base).unwrap()
    }

    fn reason(topic: &str, bytes: &[u8]) -> MalformedReason {
        match parse_telemetry(topic, bytes, known) {
            Ingested::Malformed(m) => m.reason,
            Ingested::Valid(r) => panic!("expected rejection, got {r:?}"),
        }
    }

    #[test]
    fn test_valid_reading_is_normalized() {
        let ingested = parse_telemetry(TOPIC, &payload(json!({})), known);
        assert_eq!(
            ingested,
            Ingested::Valid(TelemetryReading {
                intersection_id: "intersection_1".into(),
                lane: Lane::North,
                density_pct: 42.5,
                queue_len: 8,
                seq: 17,
                ts: 1_700_000_000.25,
            })
        );
    }

    #[test]
    fn test_density_bounds_are_rejected_not_clamped() {
        assert_eq!(
            reason(TOPIC, &payload(json!({"density_pct": 100.5}))),
            MalformedReason::DensityOutOfRange(100.5)
        );
        assert_eq!(
            reason(TOPIC, &payload(json!({"density_pct": -0.1}))),
            MalformedReason::DensityOutOfRange(-0.1)
        );
        // Both ends of the range are inclusive.
        assert!(matches!(
            parse_telemetry(TOPIC, &payload(json!({"density_pct": 100})), known),
            Ingested::Valid(_)
        ));
        assert!(matches!(
            parse_telemetry(TOPIC, &payload(json!({"density_pct": 0})), known),
            Ingested::Valid(_)
        ));
    }

    #[test]
    fn test_integer_fields() {
        assert_eq!(
            reason(TOPIC, &payload(json!({"queue_len": -1}))),
            MalformedReason::InvalidQueueLen
        );
        assert_eq!(
            reason(TOPIC, &payload(json!({"queue_len": 2.5}))),
            MalformedReason::InvalidQueueLen
        );
        assert_eq!(
            reason(TOPIC, &payload(json!({"seq": -3}))),
            MalformedReason::InvalidSeq
        );
        assert_eq!(
            reason(TOPIC, &payload(json!({"seq": "7"}))),
            MalformedReason::WrongType {
                field: "seq",
                expected: "integer"
            }
        );
    }

    #[test]
    fn test_timestamp_plausibility() {
        assert_eq!(
            reason(TOPIC, &payload(json!({"ts": -5.0}))),
            MalformedReason::ImplausibleTimestamp(-5.0)
        );
        assert_eq!(
            reason(TOPIC, &payload(json!({"ts": null}))),
            MalformedReason::MissingField("ts")
        );
    }

    #[test]
    fn test_identity_checks() {
        assert_eq!(
            reason(TOPIC, &payload(json!({"intersection_id": ""}))),
            MalformedReason::EmptyIntersection
        );
        assert_eq!(
            reason(
                "traffic/intersection_9/north/density",
                &payload(json!({"intersection_id": "intersection_9"}))
            ),
            MalformedReason::UnknownIntersection("intersection_9".into())
        );
        assert_eq!(
            reason(
                "traffic/intersection_1/up/density",
                &payload(json!({"lane": "up"}))
            ),
            MalformedReason::UnknownLane("up".into())
        );
        assert_eq!(
            reason(TOPIC, &payload(json!({"lane": "south"}))).kind(),
            "topic_mismatch"
        );
    }

    #[test]
    fn test_garbage_payloads() {
        assert_eq!(reason(TOPIC, b"[1,2,3]"), MalformedReason::NotAnObject);
        assert_eq!(reason(TOPIC, b"{not json").kind(), "invalid_json");
        assert_eq!(
            reason("traffic/intersection_1/commands", &payload(json!({}))).kind(),
            "bad_topic"
        );
    }
}
