pub mod activity;
pub mod config;
pub mod error;
pub mod skill;
pub mod state;

pub use activity::{Activity, ActivityType, EndOfConversationCode};
pub use error::{ConfigError, CrossbarError, RoutingError, SkillError, StateStoreError};
pub use skill::Skill;
pub use state::{ConversationStateStore, DelegationState, InMemoryStateStore};
