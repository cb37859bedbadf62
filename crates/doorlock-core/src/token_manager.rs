//! Current/previous token pair and its grace-period rule

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tokio::time::Instant;
use tracing::{info, warn};

use crate::notify::NotificationSink;
use crate::token::Token;

/// Owns the rotating tokens.
///
/// Exactly one current token exists at any time. The token it replaced is
/// kept as `previous` and stays acceptable only while `previous_still_valid`
/// is set, i.e. when the last rotation was caused by the timer rather than
/// by a door action that spent it.
pub struct TokenManager {
    current: Token,
    previous: Option<Token>,
    previous_still_valid: bool,
    last_rotation: Instant,
    url_prefix: String,
    rng: Box<dyn RngCore + Send>,
    sink: Arc<dyn NotificationSink>,
}

impl TokenManager {
    /// Create a token manager drawing from an OS-seeded generator
    pub fn new(url_prefix: impl Into<String>, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_rng(url_prefix, sink, Box::new(StdRng::from_entropy()))
    }

    /// Create a token manager with an explicit random source
    pub fn with_rng(
        url_prefix: impl Into<String>,
        sink: Arc<dyn NotificationSink>,
        mut rng: Box<dyn RngCore + Send>,
    ) -> Self {
        let current = Token::generate(&mut *rng);

        let manager = Self {
            current,
            previous: None,
            previous_still_valid: false,
            last_rotation: Instant::now(),
            url_prefix: url_prefix.into(),
            rng,
            sink,
        };

        info!("Initial token generated: {}", manager.current);
        manager.publish();
        manager
    }

    /// Retire the current token and draw a new one.
    ///
    /// When `preceding_action_occurred` is set the retired token dies
    /// immediately; otherwise it is still accepted until the next rotation.
    pub fn generate_and_rotate(&mut self, preceding_action_occurred: bool) -> Token {
        let mut next = Token::generate(&mut *self.rng);
        while next == self.current {
            next = Token::generate(&mut *self.rng);
        }

        self.previous = Some(self.current);
        self.previous_still_valid = !preceding_action_occurred;
        self.current = next;
        self.last_rotation = Instant::now();

        info!(
            "New token generated: {} old token: {} is {} valid",
            self.current,
            self.previous.map(|t| t.to_hex()).unwrap_or_default(),
            if self.previous_still_valid { "still" } else { "not" }
        );

        self.publish();
        self.current
    }

    /// Check a token in its textual form. Unparsable input is simply invalid.
    pub fn is_valid(&self, candidate: &str) -> bool {
        match Token::from_hex(candidate) {
            Ok(token) => self.accepts(token),
            Err(e) => {
                warn!("Token check failed: {}", e);
                false
            }
        }
    }

    /// Check a parsed token against the current/previous pair
    pub fn accepts(&self, token: Token) -> bool {
        token == self.current || (self.previous_still_valid && self.previous == Some(token))
    }

    pub fn current(&self) -> Token {
        self.current
    }

    pub fn previous_still_valid(&self) -> bool {
        self.previous_still_valid
    }

    /// When the current token was drawn
    pub fn last_rotation(&self) -> Instant {
        self.last_rotation
    }

    /// Display URL for the current token
    pub fn current_url(&self) -> String {
        format!("{}{}", self.url_prefix, self.current.to_hex())
    }

    fn publish(&self) {
        let token_hex = self.current.to_hex();
        if let Err(e) = self.sink.publish(&token_hex, &self.current_url()) {
            warn!("Failed to publish new token: {}", e);
        }
    }
}
