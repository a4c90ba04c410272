//! Async driver for the pairing handshake

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Confirmation, PairingEvent, PairingOutcome};
use crate::error::{PairingError, Result};
use crate::identity::{ClientIdentity, IdentityError, IdentityStore};
use crate::net::{
    HttpPairingTransport, PairingRequest, PairingTransport, TlsClientConfig,
    TrustedSessionFactory, build_tls_client,
};
use crate::protocol::pairing::{
    PairState, PairingResponse, PairingSession, PairingStep, Pin, QueryParams, messages, names,
};
use crate::types::{HostAddress, PairingConfig};

/// Drives pairing sessions against hosts
///
/// One machine can pair with several hosts; each call to [`pair`](Self::pair)
/// runs its own session with a fresh salt.
pub struct PairingStateMachine {
    config: PairingConfig,
    identity: Arc<IdentityStore>,
    transport: Arc<dyn PairingTransport>,
    event_tx: broadcast::Sender<PairingEvent>,
}

impl PairingStateMachine {
    /// Create a machine over an explicit transport
    #[must_use]
    pub fn new(
        config: PairingConfig,
        identity: Arc<IdentityStore>,
        transport: Arc<dyn PairingTransport>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);

        Self {
            config,
            identity,
            transport,
            event_tx,
        }
    }

    /// Create a machine that talks HTTP(S) to real hosts
    ///
    /// Loads or generates the client identity up front. Each request still
    /// carries the unique id of the identity current at that moment.
    ///
    /// # Errors
    ///
    /// Returns `PairingError::Identity` if no identity can be produced.
    pub async fn with_http(config: PairingConfig, identity: Arc<IdentityStore>) -> Result<Self> {
        let client = identity.ensure_identity().await?;
        let transport = Arc::new(HttpPairingTransport::new(client.unique_id(), &config));
        Ok(Self::new(config, identity, transport))
    }

    /// Create a machine from configuration alone
    ///
    /// Uses file storage at `identity_path` when set, memory otherwise.
    ///
    /// # Errors
    ///
    /// Returns `PairingError::Identity` if the store cannot be opened.
    pub async fn from_config(config: PairingConfig) -> Result<Self> {
        let store = match &config.identity_path {
            Some(path) => IdentityStore::open(path).await?,
            None => IdentityStore::in_memory(),
        };
        Self::with_http(config, Arc::new(store)).await
    }

    /// Subscribe to pairing events
    pub fn subscribe(&self) -> broadcast::Receiver<PairingEvent> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &PairingConfig {
        &self.config
    }

    /// The identity store used for every session
    #[must_use]
    pub fn identity(&self) -> &Arc<IdentityStore> {
        &self.identity
    }

    /// Session factory for requests to hosts paired by this machine
    #[must_use]
    pub fn trusted_sessions(&self, outcome: &PairingOutcome) -> TrustedSessionFactory {
        TrustedSessionFactory::with_transport(
            Arc::clone(&outcome.tls_config),
            Arc::clone(&self.transport),
            &self.config,
        )
        .with_client_id(outcome.unique_id.clone())
    }

    /// Pair with `host` using `pin`
    ///
    /// # Errors
    ///
    /// Returns the `PairingError` that ended the session. The optional TLS
    /// confirmation never fails the call; see [`PairingOutcome::warning`].
    pub async fn pair(&self, host: &HostAddress, pin: &Pin) -> Result<PairingOutcome> {
        self.pair_with_cancel(host, pin, &CancellationToken::new())
            .await
    }

    /// Pair with `host`, abandoning the session once `cancel` fires
    ///
    /// An in-flight request is dropped on cancellation. Once the host has
    /// accepted the pairing secret the session stays `Paired`; cancelling
    /// the TLS confirmation only marks it [`Confirmation::Failed`].
    ///
    /// # Errors
    ///
    /// Returns `PairingError::Cancelled` after cancellation, otherwise as
    /// [`pair`](Self::pair).
    pub async fn pair_with_cancel(
        &self,
        host: &HostAddress,
        pin: &Pin,
        cancel: &CancellationToken,
    ) -> Result<PairingOutcome> {
        info!("Pairing with {}", host);
        let mut session = PairingSession::new(host.clone(), pin.clone());

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PairingError::Cancelled),
            result = self.run(&mut session) => result,
        };

        match result {
            Ok(mut outcome) => {
                // The host has recorded the trust; cancelling from here on
                // only abandons the confirmation round
                if self.config.confirm_over_tls {
                    outcome.confirmation = tokio::select! {
                        biased;
                        () = cancel.cancelled() => self.confirmation_failed(host, "cancelled".to_string()),
                        confirmation = self.confirm(host, &outcome.tls_config, &outcome.unique_id) => confirmation,
                    };
                }

                info!("Paired with {}", host);
                let _ = self.event_tx.send(PairingEvent::Paired { host: host.clone() });
                Ok(outcome)
            }
            Err(e) => {
                let old = session.state();
                session.fail(&e);
                self.state_changed(host, old, session.state());

                match &e {
                    PairingError::Cancelled => info!("Pairing with {} cancelled", host),
                    _ => warn!("Pairing with {} failed during {}: {}", host, old, e),
                }
                let _ = self.event_tx.send(PairingEvent::Failed {
                    host: host.clone(),
                    kind: e.kind(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Run a pairing session on a background task
    pub fn spawn_pairing(self: &Arc<Self>, host: HostAddress, pin: Pin) -> PairingHandle {
        let cancel = CancellationToken::new();
        let machine = Arc::clone(self);
        let token = cancel.clone();

        let task = tokio::spawn(async move { machine.pair_with_cancel(&host, &pin, &token).await });

        PairingHandle { cancel, task }
    }

    async fn run(&self, session: &mut PairingSession) -> Result<PairingOutcome> {
        let identity = self.identity.ensure_identity().await?;
        let tls_config = tls_for(&identity)?;
        let device = self.config.device_name.as_str();

        // Step 1 blocks while the user types the PIN on the host
        let params = session.server_cert_request(device, &identity)?;
        let response = self
            .send(session, &identity, PairingStep::GetServerCert, params, self.config.pin_entry_timeout)
            .await?;
        self.advance(session, |s| s.handle_server_cert(&response))?;

        let params = session.client_challenge_request(device)?;
        let response = self
            .send(session, &identity, PairingStep::ClientChallenge, params, self.config.step_timeout)
            .await?;
        self.advance(session, |s| s.handle_challenge_response(&response))?;

        let params = session.server_challenge_response_request(device, &identity)?;
        let response = self
            .send(
                session,
                &identity,
                PairingStep::ServerChallengeResponse,
                params,
                self.config.step_timeout,
            )
            .await?;
        self.advance(session, |s| s.handle_server_challenge_response(&response))?;

        if session.host_proof_verified() {
            debug!("Host {} proved knowledge of the PIN", session.host());
        }

        let params = session.client_pairing_secret_request(device, &identity)?;
        let response = self
            .send(session, &identity, PairingStep::ClientPairingSecret, params, self.config.step_timeout)
            .await?;
        self.advance(session, |s| s.handle_client_pairing_secret(&response))?;

        Ok(PairingOutcome {
            host: session.host().clone(),
            state: session.state(),
            unique_id: identity.unique_id().to_string(),
            confirmation: Confirmation::Skipped,
            host_proof_verified: session.host_proof_verified(),
            tls_config,
        })
    }

    async fn send(
        &self,
        session: &PairingSession,
        identity: &ClientIdentity,
        step: PairingStep,
        params: QueryParams,
        timeout: Duration,
    ) -> Result<PairingResponse> {
        let host = session.host();
        debug!("Sending {} to {}", step, host);

        let request = PairingRequest::pair(host.host.clone(), host.http_port, params)
            .with_client_id(identity.unique_id())
            .with_read_timeout(timeout);
        let response = self.transport.send(&request).await?;

        debug!(
            "{} answered {} (paired={})",
            step,
            response.status_code,
            response.field(names::PAIRED).unwrap_or("-")
        );
        Ok(response)
    }

    /// Apply a step handler and publish the resulting transition
    fn advance<F>(&self, session: &mut PairingSession, handle: F) -> Result<()>
    where
        F: FnOnce(&mut PairingSession) -> Result<()>,
    {
        let old = session.state();
        handle(session)?;
        self.state_changed(session.host(), old, session.state());
        Ok(())
    }

    async fn confirm(
        &self,
        host: &HostAddress,
        tls: &TlsClientConfig,
        client_id: &str,
    ) -> Confirmation {
        let request = PairingRequest::pair(
            host.host.clone(),
            host.https_port,
            messages::pair_challenge(&self.config.device_name),
        )
        .with_client_id(client_id)
        .with_tls(Arc::clone(tls))
        .with_read_timeout(self.config.step_timeout);

        let message = match self.transport.send(&request).await {
            Ok(response) if response.is_success() && response.paired() => {
                debug!("{} confirmed pairing over TLS", host);
                return Confirmation::Confirmed;
            }
            Ok(response) => format!(
                "TLS confirmation answered {} (paired={})",
                response.status_code,
                response.field(names::PAIRED).unwrap_or("-")
            ),
            Err(e) => format!("TLS confirmation failed: {e}"),
        };

        self.confirmation_failed(host, message)
    }

    fn confirmation_failed(&self, host: &HostAddress, message: String) -> Confirmation {
        warn!("Paired with {} but confirmation did not complete: {}", host, message);
        let _ = self.event_tx.send(PairingEvent::Warning {
            host: host.clone(),
            message: message.clone(),
        });
        Confirmation::Failed(message)
    }

    fn state_changed(&self, host: &HostAddress, old: PairState, new: PairState) {
        if old == new {
            return;
        }
        debug!("{}: {} -> {}", host, old, new);
        let _ = self.event_tx.send(PairingEvent::StateChanged {
            host: host.clone(),
            old,
            new,
        });
    }
}

impl std::fmt::Debug for PairingStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairingStateMachine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn tls_for(identity: &ClientIdentity) -> Result<TlsClientConfig> {
    build_tls_client(identity)
        .map_err(|e| IdentityError::Certificate(format!("unusable for TLS: {e}")).into())
}

/// A pairing session running on a background task
#[derive(Debug)]
pub struct PairingHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<PairingOutcome>>,
}

impl PairingHandle {
    /// Abandon the session
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this session
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the session has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to end
    ///
    /// # Errors
    ///
    /// Returns the session's `PairingError`; an aborted task reports
    /// `PairingError::Cancelled`.
    ///
    /// # Panics
    ///
    /// Resumes the panic if the pairing task panicked.
    pub async fn wait(self) -> Result<PairingOutcome> {
        match self.task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(PairingError::Cancelled),
        }
    }
}
