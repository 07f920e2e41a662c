use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::db::{Answer, Response};

use super::{eligible::AnswerDescription, ApiId};

/// A user's proposed response to a question, before any validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDraft {
    pub question_id: ApiId,
    pub user_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub answer_ids: Vec<ApiId>,
}

/// A response that has been committed, along with the answers it selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub id: ApiId,
    pub question_id: ApiId,
    pub user_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub answers: Vec<AnswerDescription>,
}

impl RecordedResponse {
    pub fn new(response: &Response, answers: &[Answer]) -> Self {
        Self {
            id: response.id.into(),
            question_id: response.question_id.into(),
            user_id: response.user_id.clone(),
            text: response.text.clone(),
            created_at: response.created_at,
            answers: answers.iter().map(AnswerDescription::from).collect(),
        }
    }
}
