mod state;

pub use state::{ SendOutcome, SessionError, SessionEvent, SessionState };

use log::{ debug, error, info, warn };
use std::sync::{ Arc, Mutex, MutexGuard };
use tokio::sync::{ broadcast, watch, Mutex as AsyncMutex };

use crate::config::{ AgentType, ConfigError, DeploymentConfig, EndpointDescriptor, EnvironmentResolver, StaticEnvironment };
use crate::gateway::{ BackendGateway, GatewayConnector, GatewayError, HttpConnector };
use crate::identity::{ ConversationId, FileStore, IdentityStore, UserId };
use crate::models::chat::{ ChatEntry, Message, Role };

const CHAT_TARGET: &str = "nweb-chat";
const SEND_TARGET: &str = "nweb-send-msg";
const EVENT_CAPACITY: usize = 64;

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load the conversation.";
pub const SEND_FAILED_MESSAGE: &str = "Failed to send message.";

enum Phase {
    Loading,
    Ready,
    Error(String),
}

#[derive(Clone)]
struct Connection {
    gateway: Arc<dyn BackendGateway>,
    user_id: UserId,
    conversation_id: ConversationId,
}

struct Inner {
    phase: Phase,
    transcript: Vec<ChatEntry>,
    in_flight: usize,
    disposed: bool,
    /// Bumped by every `initialize`, so a slow fetch cannot overwrite a newer one.
    generation: u64,
    /// Bumped whenever the transcript is replaced wholesale. Replies to sends
    /// echoed under an older epoch are dropped.
    transcript_epoch: u64,
    gateway: Option<Arc<dyn BackendGateway>>,
    connection: Option<Connection>,
}

impl Inner {
    fn snapshot(&self) -> SessionState {
        match &self.phase {
            Phase::Loading => SessionState::Loading,
            Phase::Ready =>
                SessionState::Ready {
                    transcript: self.transcript.clone(),
                    is_typing: self.in_flight > 0,
                },
            Phase::Error(message) => SessionState::Error { message: message.clone() },
        }
    }

    fn settle_ready(&mut self) {
        // a send finishing during a reload must not hide the pending fetch
        if !matches!(self.phase, Phase::Loading) {
            self.phase = Phase::Ready;
        }
    }
}

/// Owns one chat widget's transcript and drives its load and send flows.
///
/// The controller is shared by reference (usually behind an `Arc`); every
/// method takes `&self`. Surfaces observe it through [`subscribe_state`] and
/// [`subscribe_events`] and never mutate the transcript themselves.
///
/// [`subscribe_state`]: SessionController::subscribe_state
/// [`subscribe_events`]: SessionController::subscribe_events
pub struct SessionController {
    identity: Arc<IdentityStore>,
    environment: Arc<dyn EnvironmentResolver>,
    connector: Arc<dyn GatewayConnector>,
    inner: Mutex<Inner>,
    send_lane: AsyncMutex<()>,
    state_tx: watch::Sender<SessionState>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(
        identity: Arc<IdentityStore>,
        environment: Arc<dyn EnvironmentResolver>,
        connector: Arc<dyn GatewayConnector>
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Loading);
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            identity,
            environment,
            connector,
            inner: Mutex::new(Inner {
                phase: Phase::Loading,
                transcript: Vec::new(),
                in_flight: 0,
                disposed: false,
                generation: 0,
                transcript_epoch: 0,
                gateway: None,
                connection: None,
            }),
            send_lane: AsyncMutex::new(()),
            state_tx,
            events_tx,
        }
    }

    /// Controller wired to the on-disk identity file and the HTTP backend.
    pub fn from_config(config: &DeploymentConfig) -> Self {
        let identity = IdentityStore::new(Arc::new(FileStore::new(&config.store_path)));
        Self::new(
            Arc::new(identity),
            Arc::new(StaticEnvironment::new(config.clone())),
            Arc::new(HttpConnector::new(config.request_timeout))
        )
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.lock().snapshot()
    }

    pub fn transcript(&self) -> Vec<ChatEntry> {
        self.lock().transcript.clone()
    }

    pub fn is_typing(&self) -> bool {
        self.lock().in_flight > 0
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    pub fn conversation_id(&self) -> Option<ConversationId> {
        self.lock().connection.as_ref().map(|c| c.conversation_id)
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.lock().connection.as_ref().map(|c| c.user_id)
    }

    /// Resolves configuration and identity, connects the backend on first
    /// use and loads the conversation history.
    ///
    /// Backend failures end in [`SessionState::Error`] and are not returned;
    /// only configuration problems and disposal are.
    pub async fn initialize(&self) -> Result<(), SessionError> {
        if self.is_disposed() {
            return Err(SessionError::Disposed);
        }

        let (endpoint, agent) = match self.resolve_environment() {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(target: CHAT_TARGET, "Configuration error: {}", e);
                self.fail_with(e.to_string());
                return Err(e.into());
            }
        };

        let user_id = self.identity.get_or_create_user_id().await;
        let conversation_id = self.identity.get_or_create_conversation_id().await;

        let gateway = match self.gateway_for(&endpoint, agent) {
            Ok(gateway) => gateway,
            Err(SessionError::Config(e)) => {
                error!(target: CHAT_TARGET, "Failed to connect backend: {}", e);
                self.fail_with(e.to_string());
                return Err(e.into());
            }
            Err(e) => {
                return Err(e);
            }
        };

        let generation = {
            let mut inner = self.lock();
            if inner.disposed {
                return Err(SessionError::Disposed);
            }
            inner.generation += 1;
            inner.phase = Phase::Loading;
            inner.connection = Some(Connection {
                gateway: gateway.clone(),
                user_id,
                conversation_id,
            });
            self.publish(&inner);
            inner.generation
        };

        info!(target: CHAT_TARGET, "Loading conversation {} from {}", conversation_id, endpoint);
        let result = gateway.fetch_conversation(conversation_id).await;

        let mut inner = self.lock();
        if inner.disposed {
            debug!(target: CHAT_TARGET, "Dropping conversation load for disposed session");
            return Err(SessionError::Disposed);
        }
        if inner.generation != generation {
            debug!(target: CHAT_TARGET, "Dropping superseded conversation load");
            return Ok(());
        }

        match result {
            Ok(conversation) => {
                info!(
                    target: CHAT_TARGET,
                    "Loaded {} messages for conversation {}",
                    conversation.messages.len(),
                    conversation_id
                );
                inner.transcript = conversation.messages.into_iter().map(ChatEntry::from).collect();
                inner.transcript_epoch += 1;
                inner.phase = Phase::Ready;
                self.publish(&inner);
                self.scroll_to_newest(inner.transcript.len());
            }
            Err(e) => {
                error!(target: CHAT_TARGET, "Failed to fetch conversation {}: {}", conversation_id, e);
                inner.phase = Phase::Error(LOAD_FAILED_MESSAGE.to_string());
                self.publish(&inner);
            }
        }
        Ok(())
    }

    /// Sends `text`, echoing it into the transcript before the request goes out.
    ///
    /// Sends are carried out one at a time in call order, so replies land in
    /// the order their messages were sent. A reload or reset that replaces the
    /// transcript first drops the echo together with any later reply, and
    /// sends still queued behind it never reach the backend.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored;
        }

        let (connection, epoch) = {
            let mut inner = self.lock();
            if inner.disposed {
                return SendOutcome::Disposed;
            }
            let connection = match inner.connection.clone() {
                Some(connection) => connection,
                None => {
                    warn!(target: SEND_TARGET, "Message dropped, session is not connected yet");
                    return SendOutcome::NotConnected;
                }
            };
            inner.transcript.push(ChatEntry::new(Role::User, text));
            inner.in_flight += 1;
            self.publish(&inner);
            self.scroll_to_newest(inner.transcript.len());
            (connection, inner.transcript_epoch)
        };
        let _typing = TypingGuard { controller: self };

        let result = {
            let _lane = self.send_lane.lock().await;
            {
                let inner = self.lock();
                if inner.disposed {
                    return SendOutcome::Disposed;
                }
                if inner.transcript_epoch != epoch {
                    debug!(target: SEND_TARGET, "Skipping send queued before the transcript was replaced");
                    return SendOutcome::Superseded;
                }
            }
            debug!(target: SEND_TARGET, "Sending message to conversation {}", connection.conversation_id);
            connection.gateway.send_message(connection.conversation_id, connection.user_id, text).await
        };

        self.apply_reply(epoch, result)
    }

    /// Starts a new conversation: fresh id, empty transcript, reload.
    pub async fn reset_conversation(&self) -> Result<(), SessionError> {
        if self.is_disposed() {
            return Err(SessionError::Disposed);
        }
        self.identity.reset_conversation_id().await;
        {
            let mut inner = self.lock();
            inner.transcript.clear();
            inner.transcript_epoch += 1;
            inner.phase = Phase::Loading;
            self.publish(&inner);
        }
        self.initialize().await
    }

    /// Tears the session down. Replies still in flight are dropped when they arrive.
    pub fn dispose(&self) {
        let mut inner = self.lock();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.connection = None;
        inner.gateway = None;
        info!(target: CHAT_TARGET, "Chat session disposed");
    }

    fn resolve_environment(&self) -> Result<(EndpointDescriptor, AgentType), ConfigError> {
        let endpoint = self.environment.endpoint()?;
        let agent = self.environment.agent()?;
        Ok((endpoint, agent))
    }

    fn gateway_for(
        &self,
        endpoint: &EndpointDescriptor,
        agent: AgentType
    ) -> Result<Arc<dyn BackendGateway>, SessionError> {
        let mut inner = self.lock();
        if inner.disposed {
            return Err(SessionError::Disposed);
        }
        if let Some(gateway) = &inner.gateway {
            return Ok(gateway.clone());
        }
        let gateway = self.connector.connect(endpoint, agent)?;
        inner.gateway = Some(gateway.clone());
        Ok(gateway)
    }

    fn apply_reply(&self, epoch: u64, result: Result<Message, GatewayError>) -> SendOutcome {
        let mut inner = self.lock();
        if inner.disposed {
            debug!(target: SEND_TARGET, "Dropping reply for disposed session");
            return SendOutcome::Disposed;
        }
        if inner.transcript_epoch != epoch {
            debug!(target: SEND_TARGET, "Dropping reply for a replaced transcript");
            return SendOutcome::Superseded;
        }

        match result {
            Ok(reply) if reply.role == Role::Assistant => {
                inner.transcript.push(ChatEntry::from(reply));
                inner.settle_ready();
                self.publish(&inner);
                self.scroll_to_newest(inner.transcript.len());
                SendOutcome::Replied
            }
            Ok(reply) => {
                debug!(target: SEND_TARGET, "Ignoring {} reply from backend", reply.role);
                inner.settle_ready();
                self.publish(&inner);
                SendOutcome::Filtered
            }
            Err(e) => {
                error!(target: SEND_TARGET, "Failed to send message: {}", e);
                inner.phase = Phase::Error(SEND_FAILED_MESSAGE.to_string());
                self.publish(&inner);
                SendOutcome::Failed
            }
        }
    }

    fn fail_with(&self, message: String) {
        let mut inner = self.lock();
        if inner.disposed {
            return;
        }
        inner.phase = Phase::Error(message);
        self.publish(&inner);
    }

    fn finish_typing(&self) {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        if !inner.disposed {
            self.publish(&inner);
        }
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.snapshot());
    }

    fn scroll_to_newest(&self, entries: usize) {
        // nobody listening is fine
        let _ = self.events_tx.send(SessionEvent::ScrollToNewest { entries });
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Clears one unit of "typing" on every exit path of a send.
struct TypingGuard<'a> {
    controller: &'a SessionController,
}

impl Drop for TypingGuard<'_> {
    fn drop(&mut self) {
        self.controller.finish_typing();
    }
}
