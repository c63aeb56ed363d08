use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crossbar_core::error::RoutingError;
use crossbar_core::skill::Skill;

/// Everything needed to route a skill callback to its root conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillConversationReference {
    pub conversation_id: String,
    pub channel_id: String,
    pub skill_id: String,
    pub caller_app_id: String,
    pub created_at: DateTime<Utc>,
}

/// Bijection between `(root conversation, skill)` pairs and the opaque
/// conversation ids skills address the root with.
///
/// A root host forwards to many skill conversations at once; this mapping is
/// the only way a callback finds its way home. Identifiers must be
/// unguessable and are never reused for a different pair while alive.
#[async_trait]
pub trait SkillConversationIdMapper: Send + Sync {
    /// Issue the opaque id for a `(conversation, skill)` pair, or return the
    /// id already issued while the pair's delegation is alive.
    async fn create_mapping(
        &self,
        conversation_id: &str,
        channel_id: &str,
        skill: &Skill,
        caller_app_id: &str,
    ) -> Result<String, RoutingError>;

    /// Recover the root conversation a skill-facing id addresses. A stale or
    /// forged id fails with [`RoutingError::UnknownMapping`] and must be
    /// treated as a hard rejection.
    async fn resolve(
        &self,
        skill_conversation_id: &str,
    ) -> Result<SkillConversationReference, RoutingError>;

    /// Invalidate a mapping once its delegation ends. A later delegation for
    /// the same pair gets a freshly distinct id.
    async fn remove(&self, skill_conversation_id: &str) -> Result<(), RoutingError>;
}

#[derive(Default)]
struct MapperInner {
    by_skill_conversation: HashMap<String, SkillConversationReference>,
    by_pair: HashMap<(String, String), String>,
}

/// In-memory mapper. Both directions live under one lock so the bijection can
/// never be observed half-updated.
#[derive(Clone, Default)]
pub struct InMemoryConversationIdMapper {
    inner: Arc<RwLock<MapperInner>>,
}

impl InMemoryConversationIdMapper {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SkillConversationIdMapper for InMemoryConversationIdMapper {
    async fn create_mapping(
        &self,
        conversation_id: &str,
        channel_id: &str,
        skill: &Skill,
        caller_app_id: &str,
    ) -> Result<String, RoutingError> {
        let pair = (conversation_id.to_string(), skill.id.clone());
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.by_pair.get(&pair) {
            debug!(
                conversation_id,
                skill_id = %skill.id,
                skill_conversation_id = %existing,
                "reusing live skill conversation mapping"
            );
            return Ok(existing.clone());
        }

        let skill_conversation_id = Uuid::new_v4().to_string();
        let reference = SkillConversationReference {
            conversation_id: conversation_id.to_string(),
            channel_id: channel_id.to_string(),
            skill_id: skill.id.clone(),
            caller_app_id: caller_app_id.to_string(),
            created_at: Utc::now(),
        };
        inner
            .by_skill_conversation
            .insert(skill_conversation_id.clone(), reference);
        inner.by_pair.insert(pair, skill_conversation_id.clone());

        info!(
            conversation_id,
            skill_id = %skill.id,
            skill_conversation_id = %skill_conversation_id,
            "skill conversation mapping created"
        );
        Ok(skill_conversation_id)
    }

    async fn resolve(
        &self,
        skill_conversation_id: &str,
    ) -> Result<SkillConversationReference, RoutingError> {
        let inner = self.inner.read().await;
        inner
            .by_skill_conversation
            .get(skill_conversation_id)
            .cloned()
            .ok_or_else(|| RoutingError::UnknownMapping {
                skill_conversation_id: skill_conversation_id.to_string(),
            })
    }

    async fn remove(&self, skill_conversation_id: &str) -> Result<(), RoutingError> {
        let mut inner = self.inner.write().await;
        if let Some(reference) = inner.by_skill_conversation.remove(skill_conversation_id) {
            inner
                .by_pair
                .remove(&(reference.conversation_id.clone(), reference.skill_id.clone()));
            debug!(
                conversation_id = %reference.conversation_id,
                skill_id = %reference.skill_id,
                age_secs = (Utc::now() - reference.created_at).num_seconds(),
                "skill conversation mapping invalidated"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(id: &str) -> Skill {
        Skill {
            id: id.to_string(),
            app_id: format!("{id}-app"),
            endpoint: "http://127.0.0.1:39783/".to_string(),
        }
    }

    #[tokio::test]
    async fn live_mappings_are_distinct_across_pairs_and_stable_within_one() {
        let mapper = InMemoryConversationIdMapper::new();
        let echo = skill("EchoSkillBot");

        let id_c1 = mapper.create_mapping("C1", "webchat", &echo, "root-app").await.unwrap();
        let id_c2 = mapper.create_mapping("C2", "webchat", &echo, "root-app").await.unwrap();
        assert_ne!(id_c1, id_c2);

        // Re-activating the same live pair reuses its id instead of forking
        // the skill-side conversation.
        let again = mapper.create_mapping("C1", "webchat", &echo, "root-app").await.unwrap();
        assert_eq!(id_c1, again);

        let reference = mapper.resolve(&id_c1).await.unwrap();
        assert_eq!(reference.conversation_id, "C1");
        assert_eq!(reference.skill_id, "EchoSkillBot");
        assert_eq!(reference.caller_app_id, "root-app");
    }

    #[tokio::test]
    async fn a_new_delegation_after_removal_gets_a_fresh_id() {
        let mapper = InMemoryConversationIdMapper::new();
        let echo = skill("EchoSkillBot");

        let first = mapper.create_mapping("C1", "webchat", &echo, "root-app").await.unwrap();
        mapper.remove(&first).await.unwrap();

        let second = mapper.create_mapping("C1", "webchat", &echo, "root-app").await.unwrap();
        assert_ne!(first, second);
        assert!(matches!(
            mapper.resolve(&first).await,
            Err(RoutingError::UnknownMapping { .. })
        ));
    }

    #[tokio::test]
    async fn resolving_an_unknown_id_is_a_hard_rejection_without_mutation() {
        let mapper = InMemoryConversationIdMapper::new();
        let echo = skill("EchoSkillBot");
        let live = mapper.create_mapping("C1", "webchat", &echo, "root-app").await.unwrap();

        let err = mapper.resolve("never-issued").await.unwrap_err();
        assert!(matches!(err, RoutingError::UnknownMapping { .. }));

        // The rejection mutated nothing: the live mapping still resolves and
        // the unknown id is still unknown.
        assert!(mapper.resolve(&live).await.is_ok());
        assert!(mapper.resolve("never-issued").await.is_err());
    }
}
