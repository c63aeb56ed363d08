use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level crossbar configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrossbarConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub otel: OtelConfig,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
    pub routing: RoutingConfig,
    #[serde(default)]
    pub skills: HashMap<String, SkillEntryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Caller app identity presented to skills on outbound calls.
    pub app_id: String,
    /// Callback base URL skills use to reach back into this host.
    pub skill_host_endpoint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OtelConfig {
    pub service_name: Option<String>,
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingConfig {
    /// Deadline for a single outbound forward, in seconds. A forward that
    /// exceeds it surfaces as a transport-classified skill error; it is never
    /// retried here.
    #[serde(default = "default_forward_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_forward_timeout_secs(),
        }
    }
}

fn default_forward_timeout_secs() -> u64 {
    30
}

/// Activation policy configuration: which phrase hands a conversation to
/// which skill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Phrase that starts a delegation when it appears in a message.
    #[serde(default = "default_trigger_phrase")]
    pub trigger_phrase: String,
    /// Skill activated by the trigger phrase.
    pub skill: String,
}

fn default_trigger_phrase() -> String {
    "skill".to_string()
}

/// Per-skill entry in the `[skills]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillEntryConfig {
    pub app_id: String,
    pub endpoint: String,
    /// Fixed bearer token for this skill, when the static token provider is in
    /// use. Absent means anonymous.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_full_config() {
        let config: CrossbarConfig = toml::from_str(
            r#"
            [server]
            bind_addr = "127.0.0.1:3978"
            app_id = "root-app"
            skill_host_endpoint = "http://127.0.0.1:3978/api/skills"

            [routing]
            trigger_phrase = "skill"
            skill = "EchoSkillBot"

            [forwarding]
            timeout_secs = 10

            [skills.EchoSkillBot]
            app_id = "echo-app"
            endpoint = "http://127.0.0.1:39783/"
            "#,
        )
        .expect("parse");

        assert_eq!(config.server.app_id, "root-app");
        assert_eq!(config.routing.skill, "EchoSkillBot");
        assert_eq!(config.forwarding.timeout_secs, 10);
        let echo = config.skills.get("EchoSkillBot").expect("skill entry");
        assert_eq!(echo.app_id, "echo-app");
        assert!(echo.bearer_token.is_none());
    }

    #[test]
    fn forwarding_and_trigger_default_when_omitted() {
        let config: CrossbarConfig = toml::from_str(
            r#"
            [server]
            bind_addr = "127.0.0.1:3978"
            app_id = "root-app"
            skill_host_endpoint = "http://127.0.0.1:3978/api/skills"

            [routing]
            skill = "EchoSkillBot"
            "#,
        )
        .expect("parse");

        assert_eq!(config.forwarding.timeout_secs, 30);
        assert_eq!(config.routing.trigger_phrase, "skill");
        assert!(config.skills.is_empty());
    }
}
