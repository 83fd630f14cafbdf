use serde::{ Serialize, Deserialize };

use crate::config::AgentType;
use crate::models::chat::{ Conversation, Message, Role };
use crate::identity::ConversationId;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub chat_id: u64,
    pub agent_type: AgentType,
    pub llm_message: UserLlmMessage,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLlmMessage {
    pub sender_id: u64,
    pub content: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmChat {
    pub chat_id: Option<u64>,
    #[serde(default)]
    pub messages: Vec<LlmMessage>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LlmMessagePersistence {
    Persistent,
    Temporal,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmMessageMetaInfo {
    pub sender_id: Option<u64>,
    pub role: Role,
    pub persistence: LlmMessagePersistence,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmMessage {
    pub meta_info: LlmMessageMetaInfo,
    pub content: String,
}

impl From<LlmMessage> for Message {
    fn from(message: LlmMessage) -> Self {
        Message::new(message.meta_info.role, message.content)
    }
}

impl From<LlmChat> for Conversation {
    fn from(chat: LlmChat) -> Self {
        Conversation {
            id: chat.chat_id.and_then(ConversationId::from_raw),
            messages: chat.messages.into_iter().map(Message::from).collect(),
        }
    }
}
