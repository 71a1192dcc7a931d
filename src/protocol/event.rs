//! Decoded events handed to the consumer.
//!
//! An [`Event`] is one leaf frame plus an advisory classification of its
//! body. Classification never filters anything: every leaf frame the
//! receive loop produces becomes an event.
//!
//! # Event Kinds
//!
//! | Kind | Body |
//! |------|------|
//! | `Control` | JSON with a `code` field, e.g. the room-enter reply |
//! | `Notification` | JSON with a `cmd` field, e.g. `DANMU_MSG` |
//! | `Popularity` | 4-byte big-endian viewer count |
//! | `Raw` | anything else |

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::identifiers::RoomId;

use super::frame::Frame;

// ============================================================================
// EventKind
// ============================================================================

/// Advisory classification of a leaf frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Control or status message.
    Control {
        /// Value of the `code` field.
        code: i64,
    },

    /// Typed notification.
    Notification {
        /// Value of the `cmd` field, e.g. `DANMU_MSG:4:0:2:2:2:0`.
        cmd: String,
    },

    /// Popularity count.
    Popularity {
        /// Viewer count reported by the server.
        count: u32,
    },

    /// Unclassified body.
    Raw,
}

// ============================================================================
// Event
// ============================================================================

/// One decoded leaf frame from a room's event stream.
#[derive(Debug, Clone)]
pub struct Event {
    /// Room the frame arrived on.
    pub room_id: RoomId,

    /// The leaf frame.
    pub frame: Frame,

    kind: EventKind,
    json: Option<Value>,
}

impl Event {
    /// Wraps a leaf frame, parsing and classifying its body.
    #[must_use]
    pub fn new(room_id: RoomId, frame: Frame) -> Self {
        let json = serde_json::from_slice::<Value>(&frame.body)
            .ok()
            .filter(Value::is_object);
        let kind = classify(&frame, json.as_ref());

        Self {
            room_id,
            frame,
            kind,
            json,
        }
    }

    /// Returns the classification.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Returns the body parsed as a JSON object, if it is one.
    #[inline]
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Returns the full `cmd` of a notification.
    #[inline]
    #[must_use]
    pub fn cmd(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Notification { cmd } => Some(cmd.as_str()),
            _ => None,
        }
    }

    /// Returns the `cmd` without its `:`-separated suffixes.
    ///
    /// # Example
    ///
    /// ```ignore
    /// // cmd = "DANMU_MSG:4:0:2:2:2:0"
    /// assert_eq!(event.cmd_name(), Some("DANMU_MSG"));
    /// ```
    #[inline]
    #[must_use]
    pub fn cmd_name(&self) -> Option<&str> {
        self.cmd().and_then(|cmd| cmd.split(':').next())
    }

    /// Gets a string field from the JSON body.
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.json.as_ref()?.get(key)?.as_str()
    }
}

// ============================================================================
// Classification
// ============================================================================

fn classify(frame: &Frame, json: Option<&Value>) -> EventKind {
    if let Some(json) = json {
        if let Some(code) = json.get("code") {
            return EventKind::Control {
                code: code.as_i64().unwrap_or_default(),
            };
        }

        if let Some(cmd) = json.get("cmd") {
            return EventKind::Notification {
                cmd: cmd.as_str().unwrap_or_default().to_string(),
            };
        }
    }

    match frame.popularity() {
        Some(count) => EventKind::Popularity { count },
        None => EventKind::Raw,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::frame::{Operation, ProtocolVersion};

    fn event(body: &str) -> Event {
        Event::new(
            RoomId::new(1),
            Frame::plain(Operation::Notification, body.as_bytes().to_vec()),
        )
    }

    #[test]
    fn test_control_classification() {
        let event = Event::new(
            RoomId::new(1),
            Frame::plain(Operation::RoomEnterResponse, br#"{"code":0}"#.to_vec()),
        );
        assert_eq!(event.kind(), &EventKind::Control { code: 0 });
    }

    #[test]
    fn test_notification_classification() {
        let event = event(r#"{"cmd":"DANMU_MSG:4:0:2:2:2:0","info":[]}"#);

        assert_eq!(event.cmd(), Some("DANMU_MSG:4:0:2:2:2:0"));
        assert_eq!(event.cmd_name(), Some("DANMU_MSG"));
        assert_eq!(event.get_str("cmd"), Some("DANMU_MSG:4:0:2:2:2:0"));
    }

    #[test]
    fn test_code_wins_over_cmd() {
        let event = event(r#"{"code":-101,"cmd":"X"}"#);
        assert_eq!(event.kind(), &EventKind::Control { code: -101 });
        assert_eq!(event.cmd(), None);
    }

    #[test]
    fn test_popularity_classification() {
        let event = Event::new(
            RoomId::new(1),
            Frame::new(
                ProtocolVersion::Popularity,
                Operation::HeartBeatResponse,
                42u32.to_be_bytes().to_vec(),
            ),
        );
        assert_eq!(event.kind(), &EventKind::Popularity { count: 42 });
        assert!(event.json().is_none());
    }

    #[test]
    fn test_raw_classification() {
        assert_eq!(event("not json").kind(), &EventKind::Raw);
        assert_eq!(event(r#"{"data":1}"#).kind(), &EventKind::Raw);
        assert_eq!(event("[1,2]").kind(), &EventKind::Raw);
    }
}
