mod policy;
mod recovery;

pub use policy::{ActivationPolicy, TriggerPhrasePolicy};

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crossbar_core::activity::{Activity, ActivityType, EndOfConversationCode};
use crossbar_core::config::ServerConfig;
use crossbar_core::error::{CrossbarError, StateStoreError};
use crossbar_core::state::{ConversationStateStore, DelegationState};
use crossbar_skills::{
    SkillConversationIdMapper, SkillConversationReference, SkillForwarder, SkillRegistry,
};

/// Replies the root sends back to the user after a turn.
pub type Replies = Vec<Activity>;

/// Everything persisted for one conversation. The delegation fields drive
/// routing; the rest is ordinary conversation state that error recovery
/// purges along with them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ConversationRecord {
    #[serde(default)]
    pub(crate) delegation: DelegationState,
    #[serde(default)]
    pub(crate) turn_count: u64,
}

/// The root agent's per-turn decision engine.
///
/// Per conversation this is a two-state machine, Idle and Delegating, driven
/// entirely by the state store — the router holds no per-conversation data of
/// its own. It also recovers from nothing: any error escaping a turn is
/// handled by the recovery path in `recovery.rs`, the single place
/// user-visible failure messaging happens.
pub struct TurnRouter {
    store: Arc<dyn ConversationStateStore>,
    mapper: Arc<dyn SkillConversationIdMapper>,
    forwarder: Arc<dyn SkillForwarder>,
    registry: Arc<SkillRegistry>,
    policy: Box<dyn ActivationPolicy>,
    caller_app_id: String,
}

impl TurnRouter {
    pub fn new(
        store: Arc<dyn ConversationStateStore>,
        mapper: Arc<dyn SkillConversationIdMapper>,
        forwarder: Arc<dyn SkillForwarder>,
        registry: Arc<SkillRegistry>,
        policy: Box<dyn ActivationPolicy>,
        server: &ServerConfig,
    ) -> Self {
        Self {
            store,
            mapper,
            forwarder,
            registry,
            policy,
            caller_app_id: server.app_id.clone(),
        }
    }

    /// Run one inbound turn to completion, applying error recovery if it
    /// fails. Always produces the user-bound replies for the turn.
    pub async fn process_turn(&self, activity: Activity) -> Replies {
        let turn_id = Uuid::new_v4();
        match self.handle_turn(&activity).await {
            Ok(replies) => {
                info!(
                    turn_id = %turn_id,
                    conversation_id = %activity.conversation_id,
                    activity_type = %activity.activity_type,
                    "turn_completed"
                );
                replies
            }
            Err(err) => self.recover_turn(&activity, err).await,
        }
    }

    /// Resolve a skill-facing conversation id from a callback. Unknown ids
    /// are a hard rejection the transport turns into a 404; nothing is
    /// mutated.
    pub async fn resolve_callback(
        &self,
        skill_conversation_id: &str,
    ) -> Result<SkillConversationReference, CrossbarError> {
        Ok(self.mapper.resolve(skill_conversation_id).await?)
    }

    /// Deliver an already-resolved skill callback. A termination signal runs
    /// the normal Delegating -> Idle transition on the root conversation;
    /// anything else is skill output bound for the user and is relayed
    /// untouched.
    pub async fn deliver_callback(
        &self,
        reference: &SkillConversationReference,
        activity: Activity,
    ) -> Replies {
        let inbound = activity.readdressed(&reference.conversation_id, &reference.channel_id);
        if inbound.is_end_of_conversation() {
            return self.process_turn(inbound).await;
        }
        vec![inbound]
    }

    /// The state machine proper. Recovers from nothing.
    async fn handle_turn(&self, activity: &Activity) -> Result<Replies, CrossbarError> {
        let mut record = self.load_record(&activity.conversation_id).await?;
        record.turn_count += 1;

        let delegation = record
            .delegation
            .delegation(&activity.conversation_id)?
            .map(|(skill, skill_conversation)| {
                (skill.to_string(), skill_conversation.to_string())
            });

        if let Some((skill_id, skill_conversation_id)) = delegation {
            if activity.is_end_of_conversation() {
                return self
                    .complete_delegation(activity, &mut record, &skill_id, &skill_conversation_id)
                    .await;
            }
            return self
                .forward_to_skill(activity, &mut record, &skill_id, &skill_conversation_id)
                .await;
        }

        self.handle_local_turn(activity, &mut record).await
    }

    /// Delegating pass-through: every non-termination activity goes to the
    /// active skill verbatim, with no content inspection here.
    async fn forward_to_skill(
        &self,
        activity: &Activity,
        record: &mut ConversationRecord,
        skill_id: &str,
        skill_conversation_id: &str,
    ) -> Result<Replies, CrossbarError> {
        let skill = self.registry.require(skill_id)?.clone();

        // Persist before the outbound call: the skill may call back into this
        // conversation before the forward returns.
        self.save_record(&activity.conversation_id, record, true).await?;

        let result = self
            .forwarder
            .forward(
                &self.caller_app_id,
                &skill,
                self.registry.skill_host_endpoint(),
                skill_conversation_id,
                activity,
            )
            .await?;

        info!(
            conversation_id = %activity.conversation_id,
            skill_id,
            status = result.status,
            "activity_forwarded"
        );
        Ok(Vec::new())
    }

    /// Delegating -> Idle: the skill signalled completion.
    async fn complete_delegation(
        &self,
        activity: &Activity,
        record: &mut ConversationRecord,
        skill_id: &str,
        skill_conversation_id: &str,
    ) -> Result<Replies, CrossbarError> {
        record.delegation.clear();
        self.mapper.remove(skill_conversation_id).await?;
        self.save_record(&activity.conversation_id, record, true).await?;

        let code = activity.code.unwrap_or(EndOfConversationCode::Unknown);
        let mut summary = format!("Skill \"{skill_id}\" ended the conversation with code \"{code}\".");
        if let Some(text) = activity.text.as_deref().filter(|text| !text.is_empty()) {
            summary.push_str(&format!(" Text: {text}"));
        }
        if let Some(value) = &activity.value {
            summary.push_str(&format!(" Value: {value}"));
        }

        info!(
            conversation_id = %activity.conversation_id,
            skill_id,
            code = %code,
            "delegation_completed"
        );
        Ok(vec![
            activity.reply(summary),
            activity.reply(format!(
                "Back with the root agent. {}",
                self.policy.usage_hint()
            )),
        ])
    }

    /// Idle handling: greet new members, activate a skill when the policy
    /// says so, answer locally otherwise. Ends with a forced save so local
    /// turns survive process restarts.
    async fn handle_local_turn(
        &self,
        activity: &Activity,
        record: &mut ConversationRecord,
    ) -> Result<Replies, CrossbarError> {
        let replies = match activity.activity_type {
            ActivityType::ConversationUpdate => {
                // Greet once when anyone other than the root itself joins.
                let someone_joined = activity
                    .members_added
                    .iter()
                    .any(|member| Some(member.as_str()) != activity.recipient_id.as_deref());
                if someone_joined {
                    vec![activity.reply(format!("Hello and welcome! {}", self.policy.usage_hint()))]
                } else {
                    Vec::new()
                }
            }
            ActivityType::Message => {
                if let Some(skill_id) = self.policy.select(activity) {
                    return self.activate_delegation(activity, record, &skill_id).await;
                }
                vec![activity.reply(format!("I only route conversations. {}", self.policy.usage_hint()))]
            }
            _ => Vec::new(),
        };

        self.save_record(&activity.conversation_id, record, true).await?;
        Ok(replies)
    }

    /// Idle -> Delegating: record the skill, mint the skill-facing
    /// conversation id, persist, then hand the current activity over.
    async fn activate_delegation(
        &self,
        activity: &Activity,
        record: &mut ConversationRecord,
        skill_id: &str,
    ) -> Result<Replies, CrossbarError> {
        let skill = self.registry.require(skill_id)?.clone();
        let skill_conversation_id = self
            .mapper
            .create_mapping(
                &activity.conversation_id,
                &activity.channel_id,
                &skill,
                &self.caller_app_id,
            )
            .await?;

        record.delegation.activate(&skill.id, &skill_conversation_id);
        // Persist the activation before the handoff; the skill may call back
        // into this conversation before the forward returns.
        self.save_record(&activity.conversation_id, record, true).await?;

        info!(
            conversation_id = %activity.conversation_id,
            skill_id = %skill.id,
            skill_conversation_id = %skill_conversation_id,
            "delegation_activated"
        );

        self.forwarder
            .forward(
                &self.caller_app_id,
                &skill,
                self.registry.skill_host_endpoint(),
                &skill_conversation_id,
                activity,
            )
            .await?;

        Ok(vec![activity.reply(format!("Got it, connecting you to \"{}\"...", skill.id))])
    }

    pub(crate) async fn load_record(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationRecord, CrossbarError> {
        match self.store.get(conversation_id).await? {
            Some(value) => {
                Ok(serde_json::from_value(value).map_err(StateStoreError::from)?)
            }
            None => Ok(ConversationRecord::default()),
        }
    }

    async fn save_record(
        &self,
        conversation_id: &str,
        record: &ConversationRecord,
        force: bool,
    ) -> Result<(), CrossbarError> {
        let value = serde_json::to_value(record).map_err(StateStoreError::from)?;
        self.store.set(conversation_id, value).await?;
        self.store.save_changes(conversation_id, force).await?;
        Ok(())
    }
}
