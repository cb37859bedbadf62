//! Wire reply

use serde::{Deserialize, Serialize};

use doorlock_core::Response;

use crate::error::Result;

/// One reply line: `{"code": 0, "response": "Success"}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub code: u8,
    pub response: Response,
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self {
            code: response.code(),
            response,
        }
    }
}

/// Only the code is authoritative
#[derive(Deserialize)]
struct CodeOnly {
    code: u8,
}

/// Decode a reply line; unknown codes decode as `Fail`
pub fn decode_reply(line: &str) -> Result<Response> {
    let reply: CodeOnly = serde_json::from_str(line)?;
    Ok(Response::from_code(reply.code))
}
