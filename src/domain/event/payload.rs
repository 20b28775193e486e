//! Opaque event payload.

use std::fmt;

/// Schema-less payload bytes carried by an event.
///
/// The relay never looks inside. Bytes are stored and forwarded exactly as
/// received.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct EventPayload(Vec<u8>);

impl EventPayload {
    /// Wraps raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Wraps the exact text of a JSON document.
    pub fn from_json_str(json: &str) -> Self {
        Self(json.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Payloads can be large and may hold sensitive data; log the size only.
impl fmt::Debug for EventPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventPayload({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for EventPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_text_is_kept_verbatim() {
        let payload = EventPayload::from_json_str(r#"{ "amt" : 100 }"#);
        assert_eq!(payload.as_bytes(), br#"{ "amt" : 100 }"#);
    }

    #[test]
    fn debug_hides_content() {
        let payload = EventPayload::new(b"secret".to_vec());
        assert_eq!(format!("{:?}", payload), "EventPayload(6 bytes)");
    }

    #[test]
    fn empty_payload() {
        let payload = EventPayload::default();
        assert!(payload.is_empty());
        assert_eq!(payload.len(), 0);
    }
}
