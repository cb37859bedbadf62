//! Error types for the doorlock core

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid identity template: {0}")]
    InvalidTemplate(String),

    #[error("Door actuator error: {0}")]
    Door(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
