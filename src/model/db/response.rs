use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core response data, as stored in the database.
///
/// Responses are append-only: once inserted they are never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseCore {
    pub question_id: Id,
    pub user_id: String,
    /// Free text; only non-empty for `input` questions.
    pub text: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ResponseCore {
    /// A response created now.
    pub fn new(question_id: Id, user_id: String, text: String) -> Self {
        Self {
            question_id,
            user_id,
            text,
            created_at: Utc::now(),
        }
    }
}

/// A response without an ID.
pub type NewResponse = ResponseCore;

/// A response from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub response: ResponseCore,
}

impl Deref for Response {
    type Target = ResponseCore;

    fn deref(&self) -> &Self::Target {
        &self.response
    }
}

/// Join row linking a response to one of the answers it selected.
///
/// `question_id` is denormalised from the response, and must also match the
/// answer's own question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseAnswerCore {
    pub response_id: Id,
    pub answer_id: Id,
    pub question_id: Id,
}

/// A response-answer link without an ID.
pub type NewResponseAnswer = ResponseAnswerCore;

/// A response-answer link from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseAnswer {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub link: ResponseAnswerCore,
}

impl Deref for ResponseAnswer {
    type Target = ResponseAnswerCore;

    fn deref(&self) -> &Self::Target {
        &self.link
    }
}
