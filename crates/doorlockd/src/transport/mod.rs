//! Request transport
//!
//! Line-delimited JSON over TCP or a Unix domain socket. Each line a client
//! sends is one request payload; the daemon answers every line with exactly
//! one reply line.

mod client;
mod connection;
mod server;
mod tcp;
mod types;

#[cfg(unix)]
mod unix;

// Public API
pub use client::DoorClient;
pub use connection::RequestTransport;
pub use server::RequestServer;
pub use tcp::TcpTransport;
pub use types::{decode_reply, Reply};

#[cfg(unix)]
pub use unix::UnixTransport;
