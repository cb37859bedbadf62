//! Action request payloads

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::response::Response;

/// Requested door action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Lock,
    Unlock,
}

impl Action {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "lock" => Some(Action::Lock),
            "unlock" => Some(Action::Unlock),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Lock => "lock",
            Action::Unlock => "unlock",
        }
    }
}

/// A decoded request; every field is required and must be a string
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    pub ip: String,
    pub user: String,
    pub password: String,
    pub token: String,
}

impl ActionRequest {
    /// Decode a raw payload.
    ///
    /// Fails with `NotJson` when the payload is not JSON at all and with
    /// `JsonError` when a field is missing or has the wrong type.
    pub fn parse(payload: &str) -> Result<Self, Response> {
        let value: serde_json::Value =
            serde_json::from_str(payload).map_err(|_| Response::NotJson)?;
        serde_json::from_value(value).map_err(|_| Response::JsonError)
    }
}

impl fmt::Debug for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRequest")
            .field("action", &self.action)
            .field("ip", &self.ip)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{"action":"unlock","ip":"10.0.0.7","user":"alice","password":"secret","token":"00000000000000aa"}"#;

    #[test]
    fn test_parse_valid_request() {
        let request = ActionRequest::parse(VALID).unwrap();
        assert_eq!(request.action, "unlock");
        assert_eq!(request.ip, "10.0.0.7");
        assert_eq!(request.user, "alice");
        assert_eq!(request.token, "00000000000000aa");
    }

    #[test]
    fn test_parse_not_json() {
        assert_eq!(ActionRequest::parse("lock please"), Err(Response::NotJson));
        assert_eq!(ActionRequest::parse(""), Err(Response::NotJson));
        assert_eq!(ActionRequest::parse("{\"action\":"), Err(Response::NotJson));
    }

    #[test]
    fn test_parse_missing_or_mistyped_field() {
        let missing = r#"{"action":"lock","ip":"1.2.3.4","user":"alice","token":"00"}"#;
        assert_eq!(ActionRequest::parse(missing), Err(Response::JsonError));

        let mistyped = r#"{"action":"lock","ip":"1.2.3.4","user":"alice","password":1234,"token":"00"}"#;
        assert_eq!(ActionRequest::parse(mistyped), Err(Response::JsonError));

        assert_eq!(ActionRequest::parse("[1, 2]"), Err(Response::JsonError));
        assert_eq!(ActionRequest::parse("42"), Err(Response::JsonError));
    }

    #[test]
    fn test_debug_redacts_password() {
        let request = ActionRequest::parse(VALID).unwrap();
        let debug = format!("{:?}", request);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("alice"));
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(Action::parse("lock"), Some(Action::Lock));
        assert_eq!(Action::parse("unlock"), Some(Action::Unlock));
        assert_eq!(Action::parse("LOCK"), None);
        assert_eq!(Action::parse("open"), None);
    }
}
