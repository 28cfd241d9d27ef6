//! Per-conversation message history.
//!
//! A keyed store of bounded histories: each conversation id maps to an
//! ordered sequence of (role, text) turns, capped at a configured length
//! with strictly oldest-first eviction. Conversations are created lazily
//! on first append; reading an unknown id yields an empty history, and
//! histories are only ever dropped by an explicit clear.
//!
//! The single mutex around the map makes every append atomic per id,
//! which is the only mutual exclusion the conversation state needs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use lectern_core::models::{ConversationTurn, Role};

pub struct SessionStore {
    max_turns: usize,
    sessions: Mutex<HashMap<String, VecDeque<ConversationTurn>>>,
}

impl SessionStore {
    /// `max_turns` is the number of turns retained per conversation.
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Append a turn, evicting the oldest once the cap is exceeded.
    pub fn append(&self, id: &str, role: Role, text: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        let turns = sessions.entry(id.to_string()).or_default();
        turns.push_back(ConversationTurn {
            role,
            text: text.to_string(),
        });
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    /// The retained history for `id`, oldest first. Unknown ids yield an
    /// empty sequence.
    pub fn history(&self, id: &str) -> Vec<ConversationTurn> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop all history for `id`.
    pub fn clear(&self, id: &str) {
        let mut sessions = self.sessions.lock().unwrap();
        sessions.remove(id);
    }
}
