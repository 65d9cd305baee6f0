//! Chat storage.
//!
//! A chat is a titled sequence of interactions. Each interaction records
//! the user message, every agent event emitted while answering it, and
//! the conversation as it stood when the run ended. The state saved by
//! the latest interaction is what the next run resumes from.

use std::collections::HashMap;

use agentflux_core::event::AgentEvent;
use agentflux_core::message::{Conversation, Message};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

pub const DEFAULT_CHAT_TITLE: &str = "Untitled Chat";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Chat not found: {0}")]
    ChatNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InteractionStatus {
    Completed,
    Failed,
}

/// The message history an agent run can resume from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentState {
    pub messages: Vec<Message>,
}

impl AgentState {
    pub fn into_conversation(self) -> Conversation {
        Conversation::from_messages(self.messages)
    }
}

impl From<Conversation> for AgentState {
    fn from(conversation: Conversation) -> Self {
        Self {
            messages: conversation.into_messages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub chat_id: String,
    pub status: InteractionStatus,
    pub user_message: String,
    pub created_at: DateTime<Utc>,
    pub agent_events: Vec<AgentEvent>,
    pub final_agent_state: AgentState,
}

impl Interaction {
    pub fn new(
        chat_id: impl Into<String>,
        status: InteractionStatus,
        user_message: impl Into<String>,
        agent_events: Vec<AgentEvent>,
        final_agent_state: AgentState,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat_id.into(),
            status,
            user_message: user_message.into(),
            created_at: Utc::now(),
            agent_events,
            final_agent_state,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatWithInteractions {
    pub chat: Chat,
    /// Oldest first.
    pub interactions: Vec<Interaction>,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Create a chat and return its id.
    async fn create_chat(&self, title: &str) -> String;

    /// The chat with its most recent `limit` interactions.
    async fn get_chat(&self, chat_id: &str, limit: usize)
    -> Result<ChatWithInteractions, StoreError>;

    async fn add_interaction(&self, chat_id: &str, interaction: Interaction)
    -> Result<(), StoreError>;

    /// State saved by `interaction_id`, or by the latest interaction when
    /// `None`. `Ok(None)` when the chat has no matching interaction.
    async fn agent_state(
        &self,
        chat_id: &str,
        interaction_id: Option<&str>,
    ) -> Result<Option<AgentState>, StoreError>;

    /// Most recently updated first.
    async fn list_chats(&self, limit: usize) -> Vec<Chat>;
}

struct ChatRecord {
    chat: Chat,
    interactions: Vec<Interaction>,
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryChatStore {
    chats: RwLock<HashMap<String, ChatRecord>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn create_chat(&self, title: &str) -> String {
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();
        let chat = Chat {
            id: id.clone(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.chats.write().await.insert(
            id.clone(),
            ChatRecord {
                chat,
                interactions: Vec::new(),
            },
        );
        id
    }

    async fn get_chat(
        &self,
        chat_id: &str,
        limit: usize,
    ) -> Result<ChatWithInteractions, StoreError> {
        let chats = self.chats.read().await;
        let record = chats
            .get(chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;

        let skip = record.interactions.len().saturating_sub(limit);
        Ok(ChatWithInteractions {
            chat: record.chat.clone(),
            interactions: record.interactions[skip..].to_vec(),
        })
    }

    async fn add_interaction(
        &self,
        chat_id: &str,
        interaction: Interaction,
    ) -> Result<(), StoreError> {
        let mut chats = self.chats.write().await;
        let record = chats
            .get_mut(chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;

        record.chat.updated_at = Utc::now().max(interaction.created_at);
        record.interactions.push(interaction);
        Ok(())
    }

    async fn agent_state(
        &self,
        chat_id: &str,
        interaction_id: Option<&str>,
    ) -> Result<Option<AgentState>, StoreError> {
        let chats = self.chats.read().await;
        let record = chats
            .get(chat_id)
            .ok_or_else(|| StoreError::ChatNotFound(chat_id.to_string()))?;

        let interaction = match interaction_id {
            Some(id) => record.interactions.iter().find(|i| i.id == id),
            None => record.interactions.last(),
        };
        Ok(interaction.map(|i| i.final_agent_state.clone()))
    }

    async fn list_chats(&self, limit: usize) -> Vec<Chat> {
        let chats = self.chats.read().await;
        let mut list: Vec<Chat> = chats.values().map(|r| r.chat.clone()).collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        list.truncate(limit);
        list
    }
}
