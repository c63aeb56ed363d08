use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{RoutingError, StateStoreError};

/// Per-conversation delegation record.
///
/// Fields are private so the both-or-neither invariant holds by construction:
/// `active_skill` and `skill_conversation_id` are either both set (Delegating)
/// or both empty (Idle). `activate` and `clear` are the only writers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_skill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skill_conversation_id: Option<String>,
}

impl DelegationState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn activate(
        &mut self,
        skill_id: impl Into<String>,
        skill_conversation_id: impl Into<String>,
    ) {
        self.active_skill = Some(skill_id.into());
        self.skill_conversation_id = Some(skill_conversation_id.into());
    }

    pub fn clear(&mut self) {
        self.active_skill = None;
        self.skill_conversation_id = None;
    }

    pub fn is_delegating(&self) -> bool {
        self.active_skill.is_some() && self.skill_conversation_id.is_some()
    }

    /// The active `(skill_id, skill_conversation_id)` pair, or `None` when
    /// Idle. A decoded record with exactly one side set is corrupt and is
    /// reported rather than silently repaired.
    pub fn delegation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<(&str, &str)>, RoutingError> {
        match (&self.active_skill, &self.skill_conversation_id) {
            (Some(skill), Some(skill_conversation)) => {
                Ok(Some((skill.as_str(), skill_conversation.as_str())))
            }
            (None, None) => Ok(None),
            (Some(_), None) => Err(RoutingError::CorruptDelegationState {
                conversation_id: conversation_id.to_string(),
                detail: "active skill without a skill conversation id".to_string(),
            }),
            (None, Some(_)) => Err(RoutingError::CorruptDelegationState {
                conversation_id: conversation_id.to_string(),
                detail: "skill conversation id without an active skill".to_string(),
            }),
        }
    }
}

/// Durable per-conversation key/value store — the only place routing state
/// lives.
///
/// `set` stages a value for the current turn; nothing is durable until
/// `save_changes` commits it. `force = true` commits even when nothing was
/// staged, writing the current value back through — used at every delegation
/// boundary so the state a skill callback observes is already persisted.
#[async_trait]
pub trait ConversationStateStore: Send + Sync {
    /// The effective value for a conversation: staged if present, else committed.
    async fn get(&self, conversation_id: &str) -> Result<Option<Value>, StateStoreError>;

    /// Stage a value. Not durable until `save_changes`.
    async fn set(&self, conversation_id: &str, value: Value) -> Result<(), StateStoreError>;

    /// Remove the conversation's entire state, staged and committed.
    async fn delete(&self, conversation_id: &str) -> Result<(), StateStoreError>;

    /// Commit the staged value, if any. With `force`, write through even when
    /// nothing is staged.
    async fn save_changes(&self, conversation_id: &str, force: bool)
    -> Result<(), StateStoreError>;
}

#[derive(Default)]
struct StoreInner {
    staged: HashMap<String, Value>,
    committed: HashMap<String, Value>,
}

/// In-memory store implementation. Any backend honoring the
/// [`ConversationStateStore`] contract (a database, a distributed cache) can
/// be substituted for it.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed layer only, bypassing staged values. Diagnostic accessor.
    pub async fn persisted(&self, conversation_id: &str) -> Option<Value> {
        self.inner.read().await.committed.get(conversation_id).cloned()
    }
}

#[async_trait]
impl ConversationStateStore for InMemoryStateStore {
    async fn get(&self, conversation_id: &str) -> Result<Option<Value>, StateStoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .staged
            .get(conversation_id)
            .or_else(|| inner.committed.get(conversation_id))
            .cloned())
    }

    async fn set(&self, conversation_id: &str, value: Value) -> Result<(), StateStoreError> {
        let mut inner = self.inner.write().await;
        inner.staged.insert(conversation_id.to_string(), value);
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), StateStoreError> {
        let mut inner = self.inner.write().await;
        inner.staged.remove(conversation_id);
        inner.committed.remove(conversation_id);
        Ok(())
    }

    async fn save_changes(
        &self,
        conversation_id: &str,
        force: bool,
    ) -> Result<(), StateStoreError> {
        let mut inner = self.inner.write().await;
        if let Some(value) = inner.staged.remove(conversation_id) {
            inner.committed.insert(conversation_id.to_string(), value);
        } else if force {
            // Write-through of the unchanged value.
            if let Some(value) = inner.committed.get(conversation_id).cloned() {
                inner.committed.insert(conversation_id.to_string(), value);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delegation_is_both_or_neither() {
        let mut state = DelegationState::idle();
        assert!(!state.is_delegating());
        assert_eq!(state.delegation("c1").unwrap(), None);

        state.activate("EchoSkillBot", "skill-conv-1");
        assert!(state.is_delegating());
        assert_eq!(
            state.delegation("c1").unwrap(),
            Some(("EchoSkillBot", "skill-conv-1"))
        );

        state.clear();
        assert!(!state.is_delegating());
        assert_eq!(state.delegation("c1").unwrap(), None);
    }

    #[test]
    fn one_sided_record_is_reported_as_corrupt() {
        let state: DelegationState =
            serde_json::from_value(json!({"active_skill": "EchoSkillBot"})).expect("deserialize");
        let err = state.delegation("c1").unwrap_err();
        assert!(matches!(
            err,
            RoutingError::CorruptDelegationState { .. }
        ));
    }

    #[tokio::test]
    async fn staged_values_are_not_durable_until_saved() {
        let store = InMemoryStateStore::new();
        store.set("c1", json!({"n": 1})).await.unwrap();

        assert_eq!(store.get("c1").await.unwrap(), Some(json!({"n": 1})));
        assert_eq!(store.persisted("c1").await, None);

        store.save_changes("c1", false).await.unwrap();
        assert_eq!(store.persisted("c1").await, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn unforced_save_with_nothing_staged_is_a_no_op() {
        let store = InMemoryStateStore::new();
        store.save_changes("c1", false).await.unwrap();
        assert_eq!(store.persisted("c1").await, None);

        store.save_changes("c1", true).await.unwrap();
        assert_eq!(store.persisted("c1").await, None);
    }

    #[tokio::test]
    async fn delete_removes_staged_and_committed_values() {
        let store = InMemoryStateStore::new();
        store.set("c1", json!({"n": 1})).await.unwrap();
        store.save_changes("c1", false).await.unwrap();
        store.set("c1", json!({"n": 2})).await.unwrap();

        store.delete("c1").await.unwrap();
        assert_eq!(store.get("c1").await.unwrap(), None);
        assert_eq!(store.persisted("c1").await, None);
    }
}
