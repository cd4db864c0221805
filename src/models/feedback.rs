use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub feedback_text: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub feedback_text: String,
    pub rating: i16,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackAuthor {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
}

/// Отзыв с именем автора. Если автор удален, `userId` будет null.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Option<FeedbackAuthor>,
    pub feedback_text: String,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeedbackView {
    pub fn new(feedback: Feedback, author: Option<FeedbackAuthor>) -> Self {
        FeedbackView {
            id: feedback.id,
            event_id: feedback.event_id,
            user_id: author,
            feedback_text: feedback.feedback_text,
            rating: feedback.rating,
            created_at: feedback.created_at,
            updated_at: feedback.updated_at,
        }
    }
}
