//! Doorlockd - access-control daemon for a single door
//!
//! This crate provides:
//! - Daemon configuration loading and validation
//! - LDAP credential verification
//! - Door actuation over a serial device
//! - QR code display of the current token
//! - A line-delimited JSON request server and client

pub mod config;
pub mod daemon;
pub mod error;
pub mod ldap;
pub mod qr;
pub mod serial;
pub mod transport;

pub use config::{DaemonConfig, ListenAddr};
pub use daemon::Daemon;
pub use error::{DaemonError, Result};
pub use ldap::LdapVerifier;
pub use qr::QrCodeSink;
pub use serial::{DoorCommands, SerialDoor};
pub use transport::{DoorClient, RequestServer};
