use crossbar_core::activity::{Activity, ActivityType};
use crossbar_core::config::RoutingConfig;

/// Decides whether an Idle-state activity should start a delegation, and to
/// which skill. The router only ever asks for a skill id.
pub trait ActivationPolicy: Send + Sync {
    fn select(&self, activity: &Activity) -> Option<String>;

    /// One-line hint telling the user how to reach a skill.
    fn usage_hint(&self) -> String;
}

/// Activates a single configured skill when a message mentions the trigger
/// phrase. The simplest useful policy; richer deployments substitute their
/// own.
pub struct TriggerPhrasePolicy {
    phrase: String,
    skill_id: String,
}

impl TriggerPhrasePolicy {
    pub fn new(routing: &RoutingConfig) -> Self {
        Self {
            phrase: routing.trigger_phrase.to_lowercase(),
            skill_id: routing.skill.clone(),
        }
    }
}

impl ActivationPolicy for TriggerPhrasePolicy {
    fn select(&self, activity: &Activity) -> Option<String> {
        if activity.activity_type != ActivityType::Message {
            return None;
        }
        let text = activity.text.as_deref()?;
        if text.to_lowercase().contains(&self.phrase) {
            Some(self.skill_id.clone())
        } else {
            None
        }
    }

    fn usage_hint(&self) -> String {
        format!(
            "Say \"{}\" and I'll patch you through to \"{}\".",
            self.phrase, self.skill_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TriggerPhrasePolicy {
        TriggerPhrasePolicy::new(&RoutingConfig {
            trigger_phrase: "skill".to_string(),
            skill: "EchoSkillBot".to_string(),
        })
    }

    #[test]
    fn matches_the_phrase_case_insensitively() {
        let policy = policy();
        let hit = Activity::message("C1", "webchat", "let's use the SKILL");
        assert_eq!(policy.select(&hit), Some("EchoSkillBot".to_string()));

        let miss = Activity::message("C1", "webchat", "just chatting");
        assert_eq!(policy.select(&miss), None);
    }

    #[test]
    fn only_messages_can_activate() {
        let policy = policy();
        let update = Activity::conversation_update("C1", "webchat", vec!["user1".to_string()])
            .with_text("skill");
        assert_eq!(policy.select(&update), None);
    }
}
