//! Rotating access token

use std::fmt;
use std::str::FromStr;

use rand::RngCore;

use crate::error::{Error, Result};

/// Rotating 64-bit capability value shown to users as a scannable code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl Token {
    /// Create a token from its raw value
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Draw a fresh token from two 32-bit draws
    pub fn generate<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let hi = rng.next_u32() as u64;
        let lo = rng.next_u32() as u64;
        Self((hi << 32) | lo)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Fixed-width (16 digit) lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }

    /// Parse the textual form, with or without a `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        let mut bytes = [0u8; 8];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| Error::InvalidToken(format!("{:?}: {}", s, e)))?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}
