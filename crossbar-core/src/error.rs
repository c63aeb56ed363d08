#[derive(Debug, thiserror::Error)]
pub enum CrossbarError {
    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("skill error: {0}")]
    Skill(#[from] SkillError),

    #[error("state store error: {0}")]
    State(#[from] StateStoreError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    /// A skill-facing conversation id the mapper never issued (or already
    /// invalidated). Callers must treat this as a hard rejection, not retry.
    #[error("unknown skill conversation id '{skill_conversation_id}'")]
    UnknownMapping { skill_conversation_id: String },

    #[error("delegation state for conversation {conversation_id} is one-sided: {detail}")]
    CorruptDelegationState {
        conversation_id: String,
        detail: String,
    },

    #[error("conversation id mapping backend error: {0}")]
    MappingBackend(String),
}

#[derive(Debug, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum SkillError {
    /// The skill answered outside the 200-299 range.
    #[error("skill {skill_id} at {endpoint} returned status {status}: {body}")]
    Invocation {
        skill_id: String,
        endpoint: String,
        status: u16,
        body: String,
    },

    /// The call never produced a status: connect failure, exceeded deadline,
    /// or a broken response stream.
    #[error("transport failure reaching skill {skill_id} at {endpoint}: {detail}")]
    Transport {
        skill_id: String,
        endpoint: String,
        detail: String,
    },

    #[error("token acquisition failed for app {app_id}: {detail}")]
    Token { app_id: String, detail: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    #[error("state backend error: {0}")]
    Backend(String),

    #[error("state codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("skill '{skill_id}' is not registered")]
    UnknownSkill { skill_id: String },

    #[error("skill '{skill_id}' has an invalid endpoint '{endpoint}': {detail}")]
    InvalidEndpoint {
        skill_id: String,
        endpoint: String,
        detail: String,
    },

    #[error("skill host endpoint is missing or empty")]
    MissingSkillHostEndpoint,

    #[error("failed to build outbound HTTP client: {0}")]
    HttpClient(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_error_formats_and_serializes() {
        let error = SkillError::Invocation {
            skill_id: "EchoSkillBot".to_string(),
            endpoint: "http://skills.local/v1/conversations/abc/activities".to_string(),
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "skill EchoSkillBot at http://skills.local/v1/conversations/abc/activities returned status 503: overloaded"
        );

        let encoded = serde_json::to_string(&error).expect("serialize");
        let decoded: SkillError = serde_json::from_str(&encoded).expect("deserialize");
        match decoded {
            SkillError::Invocation { skill_id, status, .. } => {
                assert_eq!(skill_id, "EchoSkillBot");
                assert_eq!(status, 503);
            }
            other => panic!("expected invocation error, got {other:?}"),
        }
    }

    #[test]
    fn umbrella_error_wraps_component_errors() {
        let error: CrossbarError = RoutingError::UnknownMapping {
            skill_conversation_id: "forged".to_string(),
        }
        .into();
        assert!(
            error
                .to_string()
                .contains("unknown skill conversation id 'forged'")
        );
    }
}
