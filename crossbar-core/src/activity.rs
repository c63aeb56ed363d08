use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Activity kinds the router understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActivityType {
    Message,
    EndOfConversation,
    ConversationUpdate,
    Event,
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::EndOfConversation => write!(f, "endOfConversation"),
            Self::ConversationUpdate => write!(f, "conversationUpdate"),
            Self::Event => write!(f, "event"),
        }
    }
}

/// Termination reason carried by an `endOfConversation` activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndOfConversationCode {
    CompletedSuccessfully,
    UserCancelled,
    BotTimedOut,
    ChannelFailed,
    /// The root caused the termination while recovering from its own error.
    RootSkillError,
    Unknown,
}

impl std::fmt::Display for EndOfConversationCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CompletedSuccessfully => write!(f, "completedSuccessfully"),
            Self::UserCancelled => write!(f, "userCancelled"),
            Self::BotTimedOut => write!(f, "botTimedOut"),
            Self::ChannelFailed => write!(f, "channelFailed"),
            Self::RootSkillError => write!(f, "rootSkillError"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// One turn's payload. Transient: the router never persists activities beyond
/// the turn that carries them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub conversation_id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Opaque payload, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Only meaningful when `type` is `endOfConversation`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<EndOfConversationCode>,
    /// Only meaningful when `type` is `conversationUpdate`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<String>,
}

impl Activity {
    pub fn message(
        conversation_id: impl Into<String>,
        channel_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            activity_type: ActivityType::Message,
            conversation_id: conversation_id.into(),
            channel_id: channel_id.into(),
            recipient_id: None,
            text: Some(text.into()),
            value: None,
            code: None,
            members_added: Vec::new(),
        }
    }

    pub fn end_of_conversation(
        conversation_id: impl Into<String>,
        channel_id: impl Into<String>,
        code: EndOfConversationCode,
    ) -> Self {
        Self {
            activity_type: ActivityType::EndOfConversation,
            conversation_id: conversation_id.into(),
            channel_id: channel_id.into(),
            recipient_id: None,
            text: None,
            value: None,
            code: Some(code),
            members_added: Vec::new(),
        }
    }

    pub fn conversation_update(
        conversation_id: impl Into<String>,
        channel_id: impl Into<String>,
        members_added: Vec<String>,
    ) -> Self {
        Self {
            activity_type: ActivityType::ConversationUpdate,
            conversation_id: conversation_id.into(),
            channel_id: channel_id.into(),
            recipient_id: None,
            text: None,
            value: None,
            code: None,
            members_added,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// A message answering into the same conversation and channel.
    pub fn reply(&self, text: impl Into<String>) -> Activity {
        Activity::message(&self.conversation_id, &self.channel_id, text)
    }

    /// The same activity re-targeted at another conversation. Used when a skill
    /// callback is mapped back onto the root conversation it belongs to.
    pub fn readdressed(
        mut self,
        conversation_id: impl Into<String>,
        channel_id: impl Into<String>,
    ) -> Activity {
        self.conversation_id = conversation_id.into();
        self.channel_id = channel_id.into();
        self
    }

    pub fn is_end_of_conversation(&self) -> bool {
        self.activity_type == ActivityType::EndOfConversation
    }
}
