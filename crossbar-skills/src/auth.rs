use std::collections::HashMap;

use async_trait::async_trait;

use crossbar_core::config::SkillEntryConfig;
use crossbar_core::error::SkillError;

/// Credential collaborator for outbound skill calls.
///
/// Negotiation mechanics live entirely behind this seam; the forwarder only
/// needs a bearer token (or none) for a `(caller, target)` app pair.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(
        &self,
        caller_app_id: &str,
        target_app_id: &str,
    ) -> Result<Option<String>, SkillError>;
}

/// No-auth provider for local development and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousTokens;

#[async_trait]
impl TokenProvider for AnonymousTokens {
    async fn token(
        &self,
        _caller_app_id: &str,
        _target_app_id: &str,
    ) -> Result<Option<String>, SkillError> {
        Ok(None)
    }
}

/// Fixed bearer tokens keyed by target app id, taken from the `[skills]`
/// config table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokens {
    tokens: HashMap<String, String>,
}

impl StaticTokens {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn from_config(skills: &HashMap<String, SkillEntryConfig>) -> Self {
        let tokens = skills
            .values()
            .filter_map(|entry| {
                entry
                    .bearer_token
                    .clone()
                    .map(|token| (entry.app_id.clone(), token))
            })
            .collect();
        Self { tokens }
    }
}

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn token(
        &self,
        _caller_app_id: &str,
        target_app_id: &str,
    ) -> Result<Option<String>, SkillError> {
        Ok(self.tokens.get(target_app_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_tokens_resolve_by_target_app() {
        let skills = [(
            "EchoSkillBot".to_string(),
            SkillEntryConfig {
                app_id: "echo-app".to_string(),
                endpoint: "http://127.0.0.1:39783/".to_string(),
                bearer_token: Some("sekrit".to_string()),
            },
        )]
        .into_iter()
        .collect();

        let tokens = StaticTokens::from_config(&skills);
        assert_eq!(
            tokens.token("root-app", "echo-app").await.unwrap(),
            Some("sekrit".to_string())
        );
        assert_eq!(tokens.token("root-app", "other-app").await.unwrap(), None);
    }
}
