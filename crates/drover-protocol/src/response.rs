//! Request/response envelope for the inbound verb surface.
//!
//! Every request returns `{ success, data?, error? }`. Failures never raise
//! across the request boundary; error codes are stable strings so callers
//! can switch on them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Response {
    pub fn ok(data: impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self {
                success: true,
                data: Some(value),
                error: None,
            },
            Err(e) => Self::err("RESPONSE_SERIALIZE_FAILED", e.to_string()),
        }
    }

    pub fn ok_empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn err(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_wraps_data() {
        let resp = Response::ok(serde_json::json!({"count": 2}));
        assert!(resp.success);
        assert_eq!(resp.data.unwrap()["count"], 2);
        assert!(resp.error.is_none());
    }

    #[test]
    fn test_err_carries_stable_code() {
        let resp = Response::err("RECOVER_SESSION_FAILED", "session file missing");
        assert!(!resp.success);
        let error = resp.error.unwrap();
        assert_eq!(error.code, "RECOVER_SESSION_FAILED");
        assert_eq!(error.message, "session file missing");
    }

    #[test]
    fn test_empty_fields_omitted_on_wire() {
        let json = serde_json::to_string(&Response::ok_empty()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }
}
