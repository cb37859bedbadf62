//! Request processing and token rotation
//!
//! [`Logic`] owns the token pair and the door behind a single async mutex.
//! Every request holds that mutex for its whole pipeline, and every timer
//! firing holds it while rotating, so requests and rotations are totally
//! ordered and nobody ever sees a half-rotated token pair.
//!
//! The rotation task sleeps until `last_rotation + token_timeout`. A
//! successful door action rotates the token itself and then signals the task
//! to re-arm, so at most one rotation happens per interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::credentials::{CredentialVerifier, IdentityTemplate, Verification};
use crate::door::{DoorController, DoorState};
use crate::error::{Error, Result};
use crate::notify::NotificationSink;
use crate::request::{Action, ActionRequest};
use crate::response::Response;
use crate::token::Token;
use crate::token_manager::TokenManager;
use crate::MAX_TOKEN_TIMEOUT_SECS;

/// Settings for the authorization engine
#[derive(Debug, Clone)]
pub struct LogicConfig {
    /// Interval after which an unused token is rotated
    pub token_timeout: Duration,

    /// Template turning a user name into a service identity
    pub identity_template: IdentityTemplate,

    /// URL prefix the token is appended to for display
    pub web_prefix: String,
}

/// Everything the exclusive lock protects
struct LogicState {
    tokens: TokenManager,
    door: Box<dyn DoorController>,
}

struct Shared {
    state: Mutex<LogicState>,
    verifier: Arc<dyn CredentialVerifier>,
    identity_template: IdentityTemplate,
    token_timeout: Duration,
    rotate_now: Notify,
}

/// The authorization engine
pub struct Logic {
    shared: Arc<Shared>,
    shutdown_tx: watch::Sender<bool>,
    rotation: Mutex<Option<JoinHandle<()>>>,
}

impl Logic {
    /// Create the engine and start the rotation task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        config: LogicConfig,
        door: Box<dyn DoorController>,
        verifier: Arc<dyn CredentialVerifier>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let tokens = TokenManager::new(config.web_prefix.clone(), sink);
        Self::with_token_manager(config, tokens, door, verifier)
    }

    /// Create the engine around an existing token manager
    pub fn with_token_manager(
        config: LogicConfig,
        tokens: TokenManager,
        door: Box<dyn DoorController>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Result<Self> {
        if config.token_timeout.is_zero() {
            return Err(Error::Config("token timeout must be positive".to_string()));
        }
        if config.token_timeout > Duration::from_secs(MAX_TOKEN_TIMEOUT_SECS) {
            return Err(Error::Config(format!(
                "token timeout must not exceed {} seconds",
                MAX_TOKEN_TIMEOUT_SECS
            )));
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(LogicState { tokens, door }),
            verifier,
            identity_template: config.identity_template,
            token_timeout: config.token_timeout,
            rotate_now: Notify::new(),
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let rotation = tokio::spawn(run_rotation(Arc::clone(&shared), shutdown_rx));

        info!(
            "Authorization engine started (token timeout {:?})",
            config.token_timeout
        );

        Ok(Self {
            shared,
            shutdown_tx,
            rotation: Mutex::new(Some(rotation)),
        })
    }

    /// Validate a raw request end-to-end and perform the action.
    ///
    /// Every failure maps to a response; nothing is propagated.
    pub async fn process(&self, payload: &str) -> Response {
        let mut state = self.shared.state.lock().await;

        debug!("Incoming request...");

        let request = match ActionRequest::parse(payload) {
            Ok(request) => request,
            Err(Response::NotJson) => {
                warn!("Request is not valid JSON");
                return Response::NotJson;
            }
            Err(response) => {
                warn!("Request is missing a required string field");
                return response;
            }
        };

        info!(
            action = %request.action,
            user = %request.user,
            ip = %request.ip,
            token = %request.token,
            "Request received"
        );

        if !state.tokens.is_valid(&request.token) {
            error!(user = %request.user, "User provided invalid token");
            return Response::InvalidToken;
        }

        let identity = self.shared.identity_template.render(&request.user);
        info!("Trying to authenticate as user {:?}", request.user);

        let verification = self
            .shared
            .verifier
            .verify(&identity, &request.password)
            .await;
        if verification != Verification::Success {
            error!(user = %request.user, "Credential check failed: {:?}", verification);
            return verification.into();
        }

        match Action::parse(&request.action) {
            Some(Action::Lock) => self.lock(&mut state),
            Some(Action::Unlock) => self.unlock(&mut state),
            None => {
                error!("Unknown action: {}", request.action);
                Response::UnknownAction
            }
        }
    }

    fn lock(&self, state: &mut LogicState) -> Response {
        if state.door.state() == DoorState::Locked {
            warn!("Unable to lock: already locked");
            return Response::AlreadyLocked;
        }

        if let Err(e) = state.door.lock() {
            error!("Door lock failed: {}", e);
            return Response::Fail;
        }

        self.spend_token(state);
        info!("Door locked");
        Response::Success
    }

    fn unlock(&self, state: &mut LogicState) -> Response {
        let previous = state.door.state();

        if let Err(e) = state.door.unlock() {
            error!("Door unlock failed: {}", e);
            return Response::Fail;
        }

        self.spend_token(state);

        if previous == DoorState::Unlocked {
            warn!("Door was already unlocked");
            return Response::AlreadyUnlocked;
        }

        info!("Door unlocked");
        Response::Success
    }

    /// Rotate after an action and re-arm the timer
    fn spend_token(&self, state: &mut LogicState) {
        state.tokens.generate_and_rotate(true);
        self.shared.rotate_now.notify_one();
    }

    /// Check a token without performing any action
    pub async fn check_token(&self, candidate: &str) -> bool {
        self.shared.state.lock().await.tokens.is_valid(candidate)
    }

    pub async fn current_token(&self) -> Token {
        self.shared.state.lock().await.tokens.current()
    }

    /// Display URL for the current token
    pub async fn current_url(&self) -> String {
        self.shared.state.lock().await.tokens.current_url()
    }

    pub async fn door_state(&self) -> DoorState {
        self.shared.state.lock().await.door.state()
    }

    /// Stop the rotation task and wait for it to exit.
    ///
    /// In-flight requests are not cancelled; callers should stop accepting
    /// requests first.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        let handle = self.rotation.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Token rotation task ended abnormally: {}", e);
            }
            info!("Authorization engine stopped");
        }
    }
}

impl Drop for Logic {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn run_rotation(shared: Arc<Shared>, mut shutdown_rx: watch::Receiver<bool>) {
    let mut deadline = shared.state.lock().await.tokens.last_rotation() + shared.token_timeout;

    loop {
        tokio::select! {
            biased;

            // Also fires when the sender is dropped
            _ = shutdown_rx.changed() => break,

            _ = shared.rotate_now.notified() => {
                debug!("Token spent by a door action, re-arming rotation timer");
            }

            _ = tokio::time::sleep_until(deadline) => {
                let mut state = shared.state.lock().await;
                if *shutdown_rx.borrow() {
                    break;
                }
                // An action may have rotated while we waited for the lock
                if state.tokens.last_rotation() + shared.token_timeout <= Instant::now() {
                    state.tokens.generate_and_rotate(false);
                }
            }
        }

        deadline = shared.state.lock().await.tokens.last_rotation() + shared.token_timeout;
    }

    debug!("Token rotation task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticVerifier;
    use crate::door::SimulatedDoor;
    use crate::notify::BroadcastSink;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const TEMPLATE: &str = "uid=%s,ou=people,dc=example,dc=org";

    struct BrokenDoor;

    impl DoorController for BrokenDoor {
        fn state(&self) -> DoorState {
            DoorState::Locked
        }

        fn lock(&mut self) -> Result<()> {
            Err(Error::Door("actuator not responding".to_string()))
        }

        fn unlock(&mut self) -> Result<()> {
            Err(Error::Door("actuator not responding".to_string()))
        }
    }

    fn config(timeout: Duration) -> LogicConfig {
        LogicConfig {
            token_timeout: timeout,
            identity_template: IdentityTemplate::parse(TEMPLATE).unwrap(),
            web_prefix: "https://door.example.org/?token=".to_string(),
        }
    }

    fn verifier() -> Arc<StaticVerifier> {
        Arc::new(
            StaticVerifier::new().with_user("uid=alice,ou=people,dc=example,dc=org", "secret"),
        )
    }

    fn start(
        timeout: Duration,
        door: Box<dyn DoorController>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> (Logic, Arc<BroadcastSink>) {
        let sink = Arc::new(BroadcastSink::new(32));
        let tokens = TokenManager::with_rng(
            "https://door.example.org/?token=",
            sink.clone(),
            Box::new(StdRng::seed_from_u64(42)),
        );
        let logic =
            Logic::with_token_manager(config(timeout), tokens, door, verifier).unwrap();
        (logic, sink)
    }

    fn start_default(initial: DoorState) -> (Logic, Arc<BroadcastSink>) {
        start(
            Duration::from_secs(60),
            Box::new(SimulatedDoor::new(initial)),
            verifier(),
        )
    }

    fn payload(action: &str, token: &str, password: &str) -> String {
        serde_json::json!({
            "action": action,
            "ip": "192.0.2.10",
            "user": "alice",
            "password": password,
            "token": token,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_rejects_zero_timeout() {
        let result = Logic::new(
            config(Duration::ZERO),
            Box::new(SimulatedDoor::default()),
            verifier(),
            Arc::new(BroadcastSink::new(1)),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_rejects_unbounded_timeout() {
        let result = Logic::new(
            config(Duration::from_secs(u64::MAX)),
            Box::new(SimulatedDoor::default()),
            verifier(),
            Arc::new(BroadcastSink::new(1)),
        );
        assert!(matches!(result, Err(Error::Config(_))));

        let result = Logic::new(
            config(Duration::from_secs(MAX_TOKEN_TIMEOUT_SECS + 1)),
            Box::new(SimulatedDoor::default()),
            verifier(),
            Arc::new(BroadcastSink::new(1)),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_longest_timeout_keeps_rotating() {
        let (logic, sink) = start(
            Duration::from_secs(MAX_TOKEN_TIMEOUT_SECS),
            Box::new(SimulatedDoor::default()),
            verifier(),
        );
        let mut rx = sink.subscribe();
        let initial = logic.current_token().await;

        let rotated = rx.recv().await.unwrap();
        assert_ne!(rotated.token_hex, initial.to_hex());
        assert!(logic.check_token(&initial.to_hex()).await);

        logic.shutdown().await;
    }

    #[tokio::test]
    async fn test_not_json_and_missing_field() {
        let (logic, _) = start_default(DoorState::Locked);

        assert_eq!(logic.process("unlock now").await, Response::NotJson);

        let missing_password =
            r#"{"action":"unlock","ip":"192.0.2.10","user":"alice","token":"00"}"#;
        assert_eq!(logic.process(missing_password).await, Response::JsonError);
    }

    #[tokio::test]
    async fn test_invalid_token_checked_before_credentials() {
        let (logic, _) = start(
            Duration::from_secs(60),
            Box::new(SimulatedDoor::default()),
            Arc::new(StaticVerifier::offline()),
        );

        let response = logic
            .process(&payload("unlock", "0000000000000000", "secret"))
            .await;
        assert_eq!(response, Response::InvalidToken);

        let response = logic.process(&payload("unlock", "garbage", "secret")).await;
        assert_eq!(response, Response::InvalidToken);
    }

    #[tokio::test]
    async fn test_credential_failures_propagate() {
        let (logic, _) = start_default(DoorState::Locked);
        let token = logic.current_token().await.to_hex();

        let response = logic.process(&payload("unlock", &token, "wrong")).await;
        assert_eq!(response, Response::InvalidCredentials);
        assert_eq!(logic.door_state().await, DoorState::Locked);

        let (offline, _) = start(
            Duration::from_secs(60),
            Box::new(SimulatedDoor::default()),
            Arc::new(StaticVerifier::offline()),
        );
        let token = offline.current_token().await.to_hex();
        let response = offline.process(&payload("unlock", &token, "secret")).await;
        assert_eq!(response, Response::ServiceInitError);
    }

    #[tokio::test]
    async fn test_unknown_action_keeps_token() {
        let (logic, _) = start_default(DoorState::Locked);
        let token = logic.current_token().await;

        let response = logic
            .process(&payload("open", &token.to_hex(), "secret"))
            .await;

        assert_eq!(response, Response::UnknownAction);
        assert_eq!(logic.current_token().await, token);
    }

    #[tokio::test]
    async fn test_unlock_spends_token() {
        let (logic, sink) = start_default(DoorState::Locked);
        let mut rx = sink.subscribe();
        let token = logic.current_token().await.to_hex();

        let response = logic.process(&payload("unlock", &token, "secret")).await;

        assert_eq!(response, Response::Success);
        assert_eq!(logic.door_state().await, DoorState::Unlocked);

        let published = rx.recv().await.unwrap();
        assert_eq!(published.token_hex, logic.current_token().await.to_hex());
        assert!(!logic.check_token(&token).await);

        let replay = logic.process(&payload("unlock", &token, "secret")).await;
        assert_eq!(replay, Response::InvalidToken);
    }

    #[tokio::test]
    async fn test_lock_twice() {
        let (logic, _) = start_default(DoorState::Unlocked);

        let first = logic.current_token().await;
        let response = logic
            .process(&payload("lock", &first.to_hex(), "secret"))
            .await;
        assert_eq!(response, Response::Success);

        let second = logic.current_token().await;
        assert_ne!(first, second);

        let response = logic
            .process(&payload("lock", &second.to_hex(), "secret"))
            .await;
        assert_eq!(response, Response::AlreadyLocked);
        // Refused lock does not rotate
        assert_eq!(logic.current_token().await, second);
    }

    #[tokio::test]
    async fn test_unlock_when_unlocked_still_rotates() {
        let (logic, _) = start_default(DoorState::Unlocked);
        let token = logic.current_token().await;

        let response = logic
            .process(&payload("unlock", &token.to_hex(), "secret"))
            .await;

        assert_eq!(response, Response::AlreadyUnlocked);
        assert_ne!(logic.current_token().await, token);
        assert!(!logic.check_token(&token.to_hex()).await);
    }

    #[tokio::test]
    async fn test_actuator_failure_keeps_token() {
        let (logic, _) = start(Duration::from_secs(60), Box::new(BrokenDoor), verifier());
        let token = logic.current_token().await;

        let response = logic
            .process(&payload("unlock", &token.to_hex(), "secret"))
            .await;

        assert_eq!(response, Response::Fail);
        assert_eq!(logic.current_token().await, token);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_rotation_grants_grace_period() {
        let (logic, sink) = start(
            Duration::from_secs(2),
            Box::new(SimulatedDoor::default()),
            verifier(),
        );
        let mut rx = sink.subscribe();
        let initial = logic.current_token().await.to_hex();

        let first = rx.recv().await.unwrap();
        assert_ne!(first.token_hex, initial);
        assert!(logic.check_token(&initial).await);
        assert!(logic.check_token(&first.token_hex).await);

        let second = rx.recv().await.unwrap();
        assert!(!logic.check_token(&initial).await);
        assert!(logic.check_token(&first.token_hex).await);
        assert!(logic.check_token(&second.token_hex).await);

        logic.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_rearms_rotation_timer() {
        let (logic, sink) = start(
            Duration::from_secs(10),
            Box::new(SimulatedDoor::default()),
            verifier(),
        );
        let mut rx = sink.subscribe();

        tokio::time::sleep(Duration::from_secs(6)).await;
        let token = logic.current_token().await.to_hex();
        let response = logic.process(&payload("unlock", &token, "secret")).await;
        assert_eq!(response, Response::Success);
        let spent = rx.recv().await.unwrap();

        // The first deadline at t=10 passes without a rotation
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());

        // A full interval after the action the timer rotates again
        tokio::time::sleep(Duration::from_secs(6)).await;
        let timed = rx.try_recv().unwrap();
        assert_ne!(timed.token_hex, spent.token_hex);
        assert!(logic.check_token(&spent.token_hex).await);

        logic.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_rotation() {
        let (logic, sink) = start(
            Duration::from_secs(1),
            Box::new(SimulatedDoor::default()),
            verifier(),
        );
        let mut rx = sink.subscribe();

        logic.shutdown().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(rx.try_recv().is_err());
        // A second shutdown is a no-op
        logic.shutdown().await;
    }
}
