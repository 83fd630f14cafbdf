use async_trait::async_trait;
use log::{ debug, info };
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{ BackendGateway, GatewayError };
use crate::config::{ AgentType, EndpointDescriptor };
use crate::identity::{ ConversationId, UserId };
use crate::models::api::{ LlmChat, LlmMessage, SendMessageRequest, UserLlmMessage };
use crate::models::chat::{ Conversation, Message };

const CHAT_ROUTE: &str = "chat";
const SEND_MESSAGE_ROUTE: &str = "send_message";

/// Talks to the Nervo server over plain JSON HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: HttpClient,
    endpoint: EndpointDescriptor,
    agent: AgentType,
}

impl HttpGateway {
    pub fn connect(
        endpoint: EndpointDescriptor,
        agent: AgentType,
        request_timeout: Duration
    ) -> Result<Self, GatewayError> {
        let http = HttpClient::builder().timeout(request_timeout).build()?;
        info!("Backend client configured: Endpoint={}, Agent={}", endpoint, agent);
        Ok(Self { http, endpoint, agent })
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(GatewayError::Status { status, body });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl BackendGateway for HttpGateway {
    async fn fetch_conversation(
        &self,
        conversation_id: ConversationId
    ) -> Result<Conversation, GatewayError> {
        let url = self.endpoint.url(&format!("{}/{}", CHAT_ROUTE, conversation_id));
        debug!("GET {}", url);
        let response = self.http.get(&url).send().await?;
        let chat: LlmChat = Self::read_json(response).await?;
        debug!("Fetched {} messages for conversation {}", chat.messages.len(), conversation_id);
        Ok(Conversation::from(chat))
    }

    async fn send_message(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        text: &str
    ) -> Result<Message, GatewayError> {
        let url = self.endpoint.url(SEND_MESSAGE_ROUTE);
        let request = SendMessageRequest {
            chat_id: conversation_id.get(),
            agent_type: self.agent,
            llm_message: UserLlmMessage {
                sender_id: user_id.get(),
                content: text.to_string(),
            },
        };
        debug!("POST {}", url);
        let response = self.http.post(&url).json(&request).send().await?;
        let reply: LlmMessage = Self::read_json(response).await?;
        Ok(Message::from(reply))
    }
}
