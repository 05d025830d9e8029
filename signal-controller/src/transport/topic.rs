//! Topic naming and filter matching.
//!
//! Telemetry arrives on `traffic/{intersection_id}/{lane}/density` and
//! schedules leave on `traffic/{intersection_id}/commands`. Filters use the
//! MQTT wildcard conventions: `+` matches one level, `#` matches the rest.

/// Root segment shared by every controller topic.
pub const TOPIC_ROOT: &str = "traffic";

/// Filter matching every telemetry channel of every intersection.
pub const TELEMETRY_FILTER: &str = "traffic/+/+/density";

/// Telemetry topic for one lane of an intersection.
pub fn telemetry_topic(intersection_id: &str, lane: &str) -> String {
    format!("{TOPIC_ROOT}/{intersection_id}/{lane}/density")
}

/// Command topic for an intersection.
pub fn command_topic(intersection_id: &str) -> String {
    format!("{TOPIC_ROOT}/{intersection_id}/commands")
}

/// Split a telemetry topic into `(intersection_id, lane_segment)`.
///
/// The lane segment is returned raw; validating it against the lane
/// enumeration is the ingest layer's job.
pub fn parse_telemetry_topic(topic: &str) -> Option<(&str, &str)> {
    let mut parts = topic.split('/');
    let root = parts.next()?;
    let intersection = parts.next()?;
    let lane = parts.next()?;
    let leaf = parts.next()?;

    if root != TOPIC_ROOT || leaf != "density" || parts.next().is_some() {
        return None;
    }
    if intersection.is_empty() || lane.is_empty() {
        return None;
    }
    Some((intersection, lane))
}

/// Whether `topic` matches the wildcard `filter`.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}
