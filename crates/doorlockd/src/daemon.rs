//! Daemon assembly: collaborators, engine and request server

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use doorlock_core::{
    CredentialVerifier, DeferredSink, DoorController, Logic, NotificationSink, SimulatedDoor,
    StaticVerifier,
};

use crate::config::{DaemonConfig, ListenAddr};
use crate::error::{DaemonError, Result};
use crate::ldap::LdapVerifier;
use crate::qr::QrCodeSink;
use crate::serial::{DoorCommands, SerialDoor};
use crate::transport::{RequestServer, TcpTransport};

/// A running daemon
pub struct Daemon {
    logic: Arc<Logic>,
    listen: ListenAddr,
    shutdown_tx: watch::Sender<bool>,
    server: JoinHandle<Result<()>>,
}

impl Daemon {
    /// Build all components from `config`, bind the listener and start serving
    pub async fn start(config: &DaemonConfig) -> Result<Self> {
        config.validate()?;
        let mut listen = config.listen_addr()?;

        let logic = Arc::new(Logic::new(
            config.logic_config()?,
            build_door(config)?,
            build_verifier(config)?,
            build_sink(config)?,
        )?);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let request_server = RequestServer::new(Arc::clone(&logic));

        let server = match listen.clone() {
            ListenAddr::Tcp(addr) => {
                let transport = TcpTransport::bind(&addr).await?;
                // Report the bound port when 0 was requested
                listen = ListenAddr::Tcp(transport.local_addr()?.to_string());
                tokio::spawn(async move { request_server.serve(transport, shutdown_rx).await })
            }
            #[cfg(unix)]
            ListenAddr::Unix(path) => {
                let transport = crate::transport::UnixTransport::bind(&path).await?;
                tokio::spawn(async move { request_server.serve(transport, shutdown_rx).await })
            }
            #[cfg(not(unix))]
            ListenAddr::Unix(_) => {
                return Err(DaemonError::Transport(
                    "Unix sockets are not supported on this platform".to_string(),
                ))
            }
        };

        info!("Accepting requests on {}", listen);
        info!("Current token URL: {}", logic.current_url().await);

        Ok(Self {
            logic,
            listen,
            shutdown_tx,
            server,
        })
    }

    pub fn logic(&self) -> &Arc<Logic> {
        &self.logic
    }

    /// Address the request server is bound to
    pub fn listen_addr(&self) -> &ListenAddr {
        &self.listen
    }

    /// Stop accepting requests, then stop token rotation
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);

        let served = match self.server.await {
            Ok(result) => result,
            Err(e) => Err(DaemonError::Transport(format!("Request server panicked: {}", e))),
        };
        if let Err(e) = &served {
            error!("Request server error: {}", e);
        }

        self.logic.shutdown().await;
        served
    }
}

/// Door actuator from config; simulated when no device is set
pub fn build_door(config: &DaemonConfig) -> Result<Box<dyn DoorController>> {
    match &config.serial_device {
        Some(path) => {
            let commands = DoorCommands {
                lock: config.lock_command,
                unlock: config.unlock_command,
            };
            Ok(Box::new(SerialDoor::open(path, commands)?))
        }
        None => {
            warn!("No door device configured, using a simulated door");
            Ok(Box::new(SimulatedDoor::default()))
        }
    }
}

/// Credential verifier from config; the static table wins over LDAP
pub fn build_verifier(config: &DaemonConfig) -> Result<Arc<dyn CredentialVerifier>> {
    match &config.static_users {
        Some(users) => {
            let template = config.identity_template()?;
            warn!(
                "Using a static table of {} user(s) instead of {}",
                users.len(),
                config.ldap_uri
            );
            let verifier: StaticVerifier = users
                .iter()
                .map(|(user, password)| (template.render(user), password.clone()))
                .collect();
            Ok(Arc::new(verifier))
        }
        None => Ok(Arc::new(LdapVerifier::new(
            config.ldap_uri.clone(),
            config.ldap_timeout(),
        ))),
    }
}

/// Token display: QR code image, written off the request path
pub fn build_sink(config: &DaemonConfig) -> Result<Arc<dyn NotificationSink>> {
    let qr = QrCodeSink::new(config.qr_path.clone(), config.qr_size);
    Ok(Arc::new(DeferredSink::spawn(qr)?))
}
