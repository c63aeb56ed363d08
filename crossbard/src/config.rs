use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crossbar_core::config::CrossbarConfig;

/// Load and deserialize config from a TOML file.
pub fn load_config(path: &Path) -> Result<CrossbarConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config: {}", path.display()))?;
    let config: CrossbarConfig =
        toml::from_str(&content).with_context(|| format!("parsing config: {}", path.display()))?;
    Ok(config)
}

/// Validate config for internal consistency:
/// - the routing policy targets a registered skill
/// - the trigger phrase and skill host endpoint are non-empty
/// - no skill entry has an empty endpoint
///
/// Endpoint URL syntax is checked again when the registry is built; failing
/// here keeps misconfiguration a startup error, never a per-turn one.
pub fn validate_config(config: &CrossbarConfig) -> Result<()> {
    if !config.skills.contains_key(&config.routing.skill) {
        anyhow::bail!(
            "routing.skill '{}' not found in [skills]",
            config.routing.skill
        );
    }

    if config.routing.trigger_phrase.trim().is_empty() {
        anyhow::bail!("routing.trigger_phrase must not be empty");
    }

    if config.server.skill_host_endpoint.trim().is_empty() {
        anyhow::bail!("server.skill_host_endpoint must not be empty");
    }

    for (id, skill) in &config.skills {
        if skill.endpoint.trim().is_empty() {
            anyhow::bail!("skill '{}' has an empty endpoint", id);
        }
        if skill.app_id.trim().is_empty() {
            anyhow::bail!("skill '{}' has an empty app_id", id);
        }
    }

    info!("config validation passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(routing_skill: &str) -> CrossbarConfig {
        toml::from_str(&format!(
            r#"
            [server]
            bind_addr = "127.0.0.1:3978"
            app_id = "root-app"
            skill_host_endpoint = "http://127.0.0.1:3978/api/skills"

            [routing]
            skill = "{routing_skill}"

            [skills.EchoSkillBot]
            app_id = "echo-app"
            endpoint = "http://127.0.0.1:39783/"
            "#
        ))
        .expect("parse")
    }

    #[test]
    fn a_consistent_config_validates() {
        validate_config(&sample("EchoSkillBot")).expect("valid");
    }

    #[test]
    fn an_unregistered_routing_target_is_fatal() {
        let err = validate_config(&sample("NoSuchSkill")).unwrap_err();
        assert!(err.to_string().contains("routing.skill"));
    }

    #[test]
    fn an_empty_skill_endpoint_is_fatal() {
        let mut config = sample("EchoSkillBot");
        config.skills.get_mut("EchoSkillBot").unwrap().endpoint = String::new();
        assert!(validate_config(&config).is_err());
    }
}
