//! Request outcomes

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::credentials::Verification;

/// The complete set of outcomes a request can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Response {
    Success,
    /// Generic failure; also what unknown codes decode to
    Fail,
    AlreadyUnlocked,
    AlreadyLocked,
    NotJson,
    /// A required field is missing or not a string
    JsonError,
    InvalidToken,
    /// Credential backend unreachable or misconfigured
    ServiceInitError,
    InvalidCredentials,
    UnknownAction,
}

impl Response {
    /// Wire code
    pub fn code(&self) -> u8 {
        match self {
            Response::Success => 0,
            Response::Fail => 1,
            Response::AlreadyUnlocked => 2,
            Response::AlreadyLocked => 3,
            Response::NotJson => 4,
            Response::JsonError => 5,
            Response::InvalidToken => 6,
            Response::ServiceInitError => 7,
            Response::InvalidCredentials => 8,
            Response::UnknownAction => 9,
        }
    }

    /// Decode a wire code; anything unlisted is `Fail`
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Response::Success,
            2 => Response::AlreadyUnlocked,
            3 => Response::AlreadyLocked,
            4 => Response::NotJson,
            5 => Response::JsonError,
            6 => Response::InvalidToken,
            7 => Response::ServiceInitError,
            8 => Response::InvalidCredentials,
            9 => Response::UnknownAction,
            _ => Response::Fail,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success)
    }

    /// Whether the door ended up in the requested state
    pub fn door_in_requested_state(&self) -> bool {
        matches!(
            self,
            Response::Success | Response::AlreadyLocked | Response::AlreadyUnlocked
        )
    }

    /// Human-readable description
    pub fn message(&self) -> &'static str {
        match self {
            Response::Success => "Success",
            Response::Fail => "Request failed",
            Response::AlreadyUnlocked => "Door was already unlocked",
            Response::AlreadyLocked => "Door is already locked",
            Response::NotJson => "Request is not valid JSON",
            Response::JsonError => "Request is missing a required field",
            Response::InvalidToken => "Token is invalid or expired",
            Response::ServiceInitError => "Credential service unavailable",
            Response::InvalidCredentials => "Invalid user name or password",
            Response::UnknownAction => "Unknown action",
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl From<Verification> for Response {
    fn from(verification: Verification) -> Self {
        match verification {
            Verification::Success => Response::Success,
            Verification::InvalidCredentials => Response::InvalidCredentials,
            Verification::ServiceInitError => Response::ServiceInitError,
        }
    }
}
