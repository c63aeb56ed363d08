use std::collections::HashMap;

use tracing::info;

use crossbar_core::config::CrossbarConfig;
use crossbar_core::error::ConfigError;
use crossbar_core::skill::Skill;

/// Catalog of known skills. Loaded once at startup; entries never change
/// afterwards.
#[derive(Debug)]
pub struct SkillRegistry {
    skills: HashMap<String, Skill>,
    skill_host_endpoint: String,
}

impl SkillRegistry {
    /// Build the registry from config, validating every endpoint up front.
    /// Registry problems are fatal at startup, never a per-turn condition.
    pub fn from_config(config: &CrossbarConfig) -> Result<Self, ConfigError> {
        if config.server.skill_host_endpoint.trim().is_empty() {
            return Err(ConfigError::MissingSkillHostEndpoint);
        }

        let mut skills = HashMap::new();
        for (id, entry) in &config.skills {
            reqwest::Url::parse(&entry.endpoint).map_err(|err| ConfigError::InvalidEndpoint {
                skill_id: id.clone(),
                endpoint: entry.endpoint.clone(),
                detail: err.to_string(),
            })?;
            skills.insert(
                id.clone(),
                Skill {
                    id: id.clone(),
                    app_id: entry.app_id.clone(),
                    endpoint: entry.endpoint.clone(),
                },
            );
        }

        info!(skill_count = skills.len(), "skill registry loaded");
        Ok(Self {
            skills,
            skill_host_endpoint: config.server.skill_host_endpoint.clone(),
        })
    }

    pub fn get(&self, id: &str) -> Option<&Skill> {
        self.skills.get(id)
    }

    /// Lookup that treats a missing skill as the configuration error it is.
    pub fn require(&self, id: &str) -> Result<&Skill, ConfigError> {
        self.skills.get(id).ok_or_else(|| ConfigError::UnknownSkill {
            skill_id: id.to_string(),
        })
    }

    /// Callback base URL handed to skills on every forward.
    pub fn skill_host_endpoint(&self) -> &str {
        &self.skill_host_endpoint
    }

    pub fn list(&self) -> Vec<&Skill> {
        self.skills.values().collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}
