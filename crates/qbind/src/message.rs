use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{QueueError, Result};

/// Returned when an instance violates its own schema rules.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The schema contract a queue-bound type fulfils.
///
/// serde supplies the field typing and (de)serialization; this trait adds
/// the type's queue identity and an optional instance-level validation hook.
/// The type name doubles as the default queue name, so producers and
/// consumers resolve the same queue independently, without coordination.
pub trait Message: Serialize + DeserializeOwned {
    /// Qualified name identifying this message type.
    ///
    /// Must be stable across process restarts — it is the derived queue
    /// name unless a binding overrides it.
    fn type_name() -> &'static str;

    /// Instance-level rules beyond what the field types enforce.
    ///
    /// Runs before serialization on send and after deserialization on
    /// receive. The default accepts everything.
    fn validate(&self) -> std::result::Result<(), ValidationError> {
        Ok(())
    }
}

/// The wire unit: an opaque serialized payload addressed to one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub queue: String,
    pub payload: Bytes,
}

/// Validate an instance and serialize it to wire bytes.
pub fn to_payload<T: Message>(instance: &T) -> Result<Bytes> {
    instance
        .validate()
        .map_err(|err| QueueError::Validation {
            type_name: T::type_name(),
            message: err.to_string(),
        })?;
    let bytes = serde_json::to_vec(instance).map_err(|source| QueueError::Serialize {
        type_name: T::type_name(),
        source,
    })?;
    Ok(Bytes::from(bytes))
}

/// Deserialize wire bytes into a validated instance.
pub fn from_payload<T: Message>(payload: &[u8]) -> Result<T> {
    let instance: T = serde_json::from_slice(payload).map_err(|source| QueueError::Deserialize {
        type_name: T::type_name(),
        source,
    })?;
    instance
        .validate()
        .map_err(|err| QueueError::Validation {
            type_name: T::type_name(),
            message: err.to_string(),
        })?;
    Ok(instance)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Person {
        first: String,
        last: String,
    }

    impl Message for Person {
        fn type_name() -> &'static str {
            "Person"
        }

        fn validate(&self) -> std::result::Result<(), ValidationError> {
            if self.first.is_empty() {
                return Err(ValidationError::new("first name must not be empty"));
            }
            Ok(())
        }
    }

    #[test]
    fn round_trip_preserves_instance() {
        let person = Person {
            first: "John".to_string(),
            last: "Doe".to_string(),
        };

        let payload = to_payload(&person).expect("serialization should succeed");
        let decoded: Person = from_payload(&payload).expect("deserialization should succeed");
        assert_eq!(decoded, person);
    }

    #[test]
    fn invalid_instance_fails_before_serialization() {
        let person = Person {
            first: String::new(),
            last: "Doe".to_string(),
        };

        assert!(matches!(
            to_payload(&person),
            Err(QueueError::Validation { type_name: "Person", .. })
        ));
    }

    #[test]
    fn malformed_payload_fails_deserialization() {
        assert!(matches!(
            from_payload::<Person>(b"not json"),
            Err(QueueError::Deserialize { type_name: "Person", .. })
        ));
    }

    #[test]
    fn validation_runs_on_receive_too() {
        let payload = br#"{"first":"","last":"Doe"}"#;
        assert!(matches!(
            from_payload::<Person>(payload),
            Err(QueueError::Validation { .. })
        ));
    }
}
