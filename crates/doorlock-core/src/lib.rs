//! Doorlock Core - the authorization engine behind doorlockd
//!
//! This crate provides:
//! - Rotating 64-bit tokens with a one-token grace period
//! - The request validation pipeline (payload, token, credentials, action)
//! - The door state machine on top of a pluggable actuator
//! - A background rotation task sharing state with concurrent requests
//!
//! Directory services, door actuators and token displays are reached through
//! the [`CredentialVerifier`], [`DoorController`] and [`NotificationSink`]
//! traits.

pub mod credentials;
pub mod door;
pub mod error;
pub mod logic;
pub mod notify;
pub mod request;
pub mod response;
pub mod token;
pub mod token_manager;

pub use credentials::{CredentialVerifier, IdentityTemplate, StaticVerifier, Verification};
pub use door::{DoorController, DoorState, SimulatedDoor};
pub use error::{Error, Result};
pub use logic::{Logic, LogicConfig};
pub use notify::{BroadcastSink, DeferredSink, LogSink, NotificationSink, Publication};
pub use request::{Action, ActionRequest};
pub use response::Response;
pub use token::Token;
pub use token_manager::TokenManager;

/// Default token rotation interval in seconds
pub const DEFAULT_TOKEN_TIMEOUT_SECS: u64 = 60;

/// Longest accepted token rotation interval (one year) in seconds
pub const MAX_TOKEN_TIMEOUT_SECS: u64 = 365 * 24 * 60 * 60;
