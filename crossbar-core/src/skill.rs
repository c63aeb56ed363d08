use serde::{Deserialize, Serialize};

/// A registered remote delegate. Immutable once loaded from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub id: String,
    /// App identity used for outbound credential negotiation.
    pub app_id: String,
    /// Base URL activities are posted to.
    pub endpoint: String,
}
