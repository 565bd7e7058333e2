//! JSON codec for control envelopes.

use crate::messages::{ControlRequest, ControlResponse};
use thiserror::Error;

/// Errors that can occur during envelope encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to serialize request: {0}")]
    SerializeError(#[source] serde_json::Error),

    /// The peer answered with something that is not a control envelope.
    #[error("Malformed envelope '{payload}': {source}")]
    Malformed {
        payload: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn encode_request(request: &ControlRequest) -> Result<String, CodecError> {
    serde_json::to_string(request).map_err(CodecError::SerializeError)
}

pub fn decode_response(text: &str) -> Result<ControlResponse, CodecError> {
    serde_json::from_str(text).map_err(|source| CodecError::Malformed {
        payload: text.to_string(),
        source,
    })
}

/// Decode a request, as a transport peer would.
pub fn decode_request(text: &str) -> Result<ControlRequest, CodecError> {
    serde_json::from_str(text).map_err(|source| CodecError::Malformed {
        payload: text.to_string(),
        source,
    })
}

pub fn encode_response(response: &ControlResponse) -> Result<String, CodecError> {
    serde_json::to_string(response).map_err(CodecError::SerializeError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ThrowType;

    #[test]
    fn test_decode_request() {
        let request = decode_request(r#"{"Type":"Release","Id":12}"#).unwrap();
        assert_eq!(request, ControlRequest::Release { id: 12 });

        let text = r#"{"Type":"Activate","Id":4,"ThrowType":"SingleThrow"}"#;
        let request = decode_request(text).unwrap();
        assert_eq!(
            request,
            ControlRequest::Activate {
                id: 4,
                throw_type: ThrowType::SingleThrow
            }
        );
    }

    #[test]
    fn test_decode_malformed_response() {
        for text in ["", "OK", r#"{"Status":"OK"}"#, r#"{"Result":1}"#] {
            let err = decode_response(text).unwrap_err();
            assert!(matches!(err, CodecError::Malformed { .. }), "{}", text);
        }
    }

    #[test]
    fn test_encode_response() {
        assert_eq!(encode_response(&ControlResponse::ok()).unwrap(), r#"{"Result":"OK"}"#);
    }
}
