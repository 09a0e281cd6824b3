//! The pluggable transport contract for cross-process topic mirroring.
//!
//! The fabric does not prescribe a transport. A concrete backend is itself a
//! service registered in the [`ServiceDirectory`]; the bus consults it on
//! every network-writer publish and the backend calls back into
//! [`Bus::deliver`] when bytes arrive for a local topic.
//!
//! [`ServiceDirectory`]: crate::services::ServiceDirectory
//! [`Bus::deliver`]: crate::bus::Bus::deliver

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::bus::Event;

/// Wire format revision for typed envelopes. Bump on any schema change; the
/// receive side rejects mismatches instead of guessing.
pub const WIRE_FORMAT_VERSION: u32 = 1;

/// How events on a networked topic are laid out on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SerializationMethod {
    /// The full typed event inside a versioned envelope.
    #[default]
    Typed,
    /// An opaque byte string, carried locally as a `String` event. Used for
    /// payloads that are already encoded (e.g. protobuf frames).
    Raw,
}

/// Per-topic network configuration.
#[derive(Debug, Clone, Default)]
pub struct TopicConfig {
    pub serialization: SerializationMethod,
}

/// Errors surfaced by network-aware publishing and delivery.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("failed to encode event: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode event: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("wire format version mismatch: got {got}, expected {expected}")]
    VersionMismatch { got: u32, expected: u32 },

    #[error("topic '{topic}' has no decoder installed")]
    NoDecoder { topic: String },

    #[error("topic '{topic}' is not registered")]
    UnknownTopic { topic: String },

    #[error("backend failure: {0}")]
    Backend(String),
}

/// An event that can cross a process boundary.
///
/// Blanket-implemented for every event with a serde representation.
pub trait WireEvent: Event + Serialize + DeserializeOwned {}

impl<T> WireEvent for T where T: Event + Serialize + DeserializeOwned {}

/// A transport capable of mirroring topics to other processes.
///
/// Contract only: the fabric ships no backend. Implementations register
/// themselves under `dyn NetworkBackend` in the service directory.
pub trait NetworkBackend: Send + Sync + 'static {
    /// Whether publishes on `topic` should be sent through this backend.
    fn is_topic_networked(&self, topic: &str) -> bool;

    /// Announces a topic and its wire configuration to the transport.
    fn topic_create(&self, topic: &str, config: &TopicConfig);

    /// Sends one serialized event. Failures are reported to the publisher as
    /// warnings; they never abort the in-process publish.
    fn topic_send(&self, topic: &str, payload: Vec<u8>) -> Result<(), NetworkError>;
}

#[derive(serde::Serialize, serde::Deserialize)]
struct Envelope {
    version: u32,
    payload: serde_json::Value,
}

/// Encodes a typed event into a versioned envelope.
pub(crate) fn encode_event<T: WireEvent>(event: &T) -> Result<Vec<u8>, NetworkError> {
    let envelope = Envelope {
        version: WIRE_FORMAT_VERSION,
        payload: serde_json::to_value(event).map_err(NetworkError::Encode)?,
    };
    serde_json::to_vec(&envelope).map_err(NetworkError::Encode)
}

/// Decodes a versioned envelope back into the concrete event type.
pub(crate) fn decode_event<T: WireEvent>(bytes: &[u8]) -> Result<T, NetworkError> {
    let envelope: Envelope = serde_json::from_slice(bytes).map_err(NetworkError::Decode)?;
    if envelope.version != WIRE_FORMAT_VERSION {
        return Err(NetworkError::VersionMismatch {
            got: envelope.version,
            expected: WIRE_FORMAT_VERSION,
        });
    }
    serde_json::from_value(envelope.payload).map_err(NetworkError::Decode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        seq: u64,
        label: String,
    }

    #[test]
    fn envelope_round_trip() {
        let event = Sample {
            seq: 42,
            label: "pose".into(),
        };
        let bytes = encode_event(&event).unwrap();
        let back: Sample = decode_event(&bytes).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let bytes =
            serde_json::to_vec(&serde_json::json!({ "version": 999, "payload": {} })).unwrap();
        match decode_event::<Sample>(&bytes) {
            Err(NetworkError::VersionMismatch { got, expected }) => {
                assert_eq!(got, 999);
                assert_eq!(expected, WIRE_FORMAT_VERSION);
            }
            other => panic!("expected version mismatch, got {other:?}"),
        }
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            decode_event::<Sample>(b"not json"),
            Err(NetworkError::Decode(_))
        ));
    }
}
