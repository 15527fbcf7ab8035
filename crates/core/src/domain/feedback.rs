use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Positive,
    Negative,
}

impl FeedbackType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

/// Sentiment on a delivered answer, keyed by the platform message id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub message_id: String,
    pub user_id: String,
    pub feedback_type: FeedbackType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl FeedbackRecord {
    pub fn positive(message_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            user_id: user_id.into(),
            feedback_type: FeedbackType::Positive,
            comments: None,
        }
    }

    pub fn negative(
        message_id: impl Into<String>,
        user_id: impl Into<String>,
        comments: impl Into<String>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            user_id: user_id.into(),
            feedback_type: FeedbackType::Negative,
            comments: Some(comments.into()),
        }
    }
}
