//! Host runtime capabilities
//!
//! The action never talks to a concrete host. It sees the host through
//! `AgentRuntime` (state and settings) and `HandlerCallback` (the reply
//! channel). `InMemoryRuntime` is the host used by the binaries and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::env;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

pub mod history;
pub use history::ConversationHistory;

/// Number of messages rendered into `{{recentMessages}}`
pub const RECENT_MESSAGE_COUNT: usize = 32;

/// Rooms kept in memory before the least recently active one is dropped
pub const DEFAULT_MAX_ROOMS: usize = 1024;

//
// ================= Messages =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: None,
        }
    }
}

/// A single message exchanged in a room
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub content: Content,
    pub created_at: DateTime<Utc>,
}

impl Memory {
    pub fn new(user_id: Uuid, room_id: Uuid, content: Content) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            room_id,
            content,
            created_at: Utc::now(),
        }
    }
}

//
// ================= State =================
//

/// Conversation state handed to prompt templates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct State {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub room_id: Uuid,
    pub recent_messages: String,
    pub recent_messages_data: Vec<Memory>,
    /// Extra template values, keyed by placeholder name
    #[serde(default)]
    pub values: HashMap<String, String>,
}

impl State {
    /// Value for a `{{key}}` placeholder
    pub fn value(&self, key: &str) -> Option<String> {
        match key {
            "agentName" => Some(self.agent_name.clone()),
            "agentId" => Some(self.agent_id.to_string()),
            "roomId" => Some(self.room_id.to_string()),
            "recentMessages" => Some(self.recent_messages.clone()),
            other => self.values.get(other).cloned(),
        }
    }
}

/// Fill `{{key}}` placeholders of `template` from `state`.
///
/// Unknown keys render as empty strings; an unterminated `{{` is kept as is.
pub fn compose_context(state: &State, template: &str) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                out.push_str(&state.value(key).unwrap_or_default());
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

//
// ================= Capabilities =================
//

/// What an action may ask of its host
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    fn agent_id(&self) -> Uuid;

    /// Build a fresh state for `message`.
    async fn compose_state(&self, message: &Memory) -> State;

    /// Refresh the recent-message view of an existing state.
    async fn update_recent_message_state(&self, state: State) -> State;

    /// Agent-level setting.
    fn get_setting(&self, key: &str) -> Option<String>;
}

/// Reply channel for an action's single result
#[async_trait]
pub trait HandlerCallback: Send + Sync {
    async fn respond(&self, content: Content);
}

/// Callback that records every reply, used by the HTTP surface and tests
#[derive(Clone, Default)]
pub struct CollectingCallback {
    replies: Arc<RwLock<Vec<Content>>>,
}

impl CollectingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replies(&self) -> Vec<Content> {
        self.replies.read().await.clone()
    }
}

#[async_trait]
impl HandlerCallback for CollectingCallback {
    async fn respond(&self, content: Content) {
        self.replies.write().await.push(content);
    }
}

//
// ================= In-Memory Host =================
//

/// Room histories with least-recently-active eviction
#[derive(Default)]
struct Rooms {
    histories: HashMap<Uuid, ConversationHistory>,
    /// Room ids, least recently active first
    order: VecDeque<Uuid>,
}

impl Rooms {
    fn touch(&mut self, room_id: Uuid, max_rooms: usize) -> &mut ConversationHistory {
        if self.histories.contains_key(&room_id) {
            self.order.retain(|id| *id != room_id);
        } else {
            while max_rooms > 0 && self.histories.len() >= max_rooms {
                let Some(evicted) = self.order.pop_front() else {
                    break;
                };
                self.histories.remove(&evicted);
                debug!(room_id = %evicted, "Evicted idle room");
            }
        }

        self.order.push_back(room_id);
        self.histories
            .entry(room_id)
            .or_insert_with(|| ConversationHistory::new(room_id, RECENT_MESSAGE_COUNT * 4))
    }
}

/// Process-local host with settings and per-room history
pub struct InMemoryRuntime {
    agent_id: Uuid,
    agent_name: String,
    settings: HashMap<String, String>,
    env_fallback: bool,
    max_rooms: usize,
    rooms: Arc<RwLock<Rooms>>,
}

impl InMemoryRuntime {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_id: Uuid::new_v4(),
            agent_name: agent_name.into(),
            settings: HashMap::new(),
            env_fallback: false,
            max_rooms: DEFAULT_MAX_ROOMS,
            rooms: Arc::new(RwLock::new(Rooms::default())),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Let `get_setting` fall through to the process environment.
    pub fn with_env_fallback(mut self) -> Self {
        self.env_fallback = true;
        self
    }

    /// Cap on rooms held in memory; 0 means unbounded.
    pub fn with_max_rooms(mut self, max_rooms: usize) -> Self {
        self.max_rooms = max_rooms;
        self
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Store a message in its room's history
    pub async fn remember(&self, message: Memory) {
        let mut rooms = self.rooms.write().await;
        rooms
            .touch(message.room_id, self.max_rooms)
            .add_message(message);
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.histories.len()
    }

    async fn recent(&self, room_id: Uuid) -> Vec<Memory> {
        let rooms = self.rooms.read().await;
        rooms
            .histories
            .get(&room_id)
            .map(|history| history.recent_messages(RECENT_MESSAGE_COUNT))
            .unwrap_or_default()
    }
}

#[async_trait]
impl AgentRuntime for InMemoryRuntime {
    fn agent_id(&self) -> Uuid {
        self.agent_id
    }

    async fn compose_state(&self, message: &Memory) -> State {
        self.remember(message.clone()).await;

        let recent_messages_data = self.recent(message.room_id).await;
        let recent_messages = ConversationHistory::format_messages(
            &recent_messages_data,
            self.agent_id,
            &self.agent_name,
        );

        debug!(
            room_id = %message.room_id,
            message_count = recent_messages_data.len(),
            "Composed state"
        );

        State {
            agent_id: self.agent_id,
            agent_name: self.agent_name.clone(),
            room_id: message.room_id,
            recent_messages,
            recent_messages_data,
            values: HashMap::new(),
        }
    }

    async fn update_recent_message_state(&self, mut state: State) -> State {
        state.recent_messages_data = self.recent(state.room_id).await;
        state.recent_messages = ConversationHistory::format_messages(
            &state.recent_messages_data,
            self.agent_id,
            &self.agent_name,
        );
        state
    }

    fn get_setting(&self, key: &str) -> Option<String> {
        self.settings.get(key).cloned().or_else(|| {
            if self.env_fallback {
                env::var(key).ok()
            } else {
                None
            }
        })
    }
}
