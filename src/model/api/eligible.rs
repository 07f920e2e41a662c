use serde::{Deserialize, Serialize};

use crate::model::db::{Answer, Question, QuestionType};

use super::ApiId;

/// A question as presented to a respondent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDescription {
    pub id: ApiId,
    pub campaign_id: ApiId,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
}

impl From<&Question> for QuestionDescription {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id.into(),
            campaign_id: question.campaign_id.into(),
            text: question.text.clone(),
            question_type: question.question_type,
        }
    }
}

/// One selectable answer to a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDescription {
    pub id: ApiId,
    pub text: String,
}

impl From<&Answer> for AnswerDescription {
    fn from(answer: &Answer) -> Self {
        Self {
            id: answer.id.into(),
            text: answer.text.clone(),
        }
    }
}

/// A question the user may currently answer, the answers they may pick from,
/// and the capability token that authorizes their submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleQuestion {
    pub question: QuestionDescription,
    pub answers: Vec<AnswerDescription>,
    pub token: String,
}
