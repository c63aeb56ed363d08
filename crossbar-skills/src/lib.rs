pub mod auth;
pub mod conversation_ids;
pub mod forwarder;
pub mod registry;

pub use auth::{AnonymousTokens, StaticTokens, TokenProvider};
pub use conversation_ids::{
    InMemoryConversationIdMapper, SkillConversationIdMapper, SkillConversationReference,
};
pub use forwarder::{HttpSkillForwarder, InvocationResult, SkillForwarder};
pub use registry::SkillRegistry;
