pub mod http;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ AgentType, ConfigError, EndpointDescriptor };
use crate::identity::{ ConversationId, UserId };
use crate::models::chat::{ Conversation, Message };

pub use self::http::HttpGateway;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request failed with status code: {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Remote side of a chat session.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    async fn fetch_conversation(
        &self,
        conversation_id: ConversationId
    ) -> Result<Conversation, GatewayError>;

    async fn send_message(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        text: &str
    ) -> Result<Message, GatewayError>;
}

/// Binds a gateway to an endpoint and agent variant before first use.
pub trait GatewayConnector: Send + Sync {
    fn connect(
        &self,
        endpoint: &EndpointDescriptor,
        agent: AgentType
    ) -> Result<Arc<dyn BackendGateway>, ConfigError>;
}

#[derive(Debug, Clone)]
pub struct HttpConnector {
    pub request_timeout: Duration,
}

impl HttpConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl GatewayConnector for HttpConnector {
    fn connect(
        &self,
        endpoint: &EndpointDescriptor,
        agent: AgentType
    ) -> Result<Arc<dyn BackendGateway>, ConfigError> {
        let gateway = HttpGateway::connect(endpoint.clone(), agent, self.request_timeout).map_err(|e|
            ConfigError::Client(e.to_string())
        )?;
        Ok(Arc::new(gateway))
    }
}
