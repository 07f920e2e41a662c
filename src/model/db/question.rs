use std::fmt::{Display, Formatter};
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// The kinds of question a campaign can ask.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    /// Pick one of the predefined answers.
    Single,
    /// Pick any number of the predefined answers.
    Multi,
    /// Free text, no predefined answers.
    Input,
}

impl QuestionType {
    /// Does this question take free text rather than predefined answers?
    pub fn is_input(self) -> bool {
        self == Self::Input
    }
}

impl Display for QuestionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Single => "single",
            Self::Multi => "multi",
            Self::Input => "input",
        };
        write!(f, "{name}")
    }
}

/// Core question data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCore {
    pub campaign_id: Id,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub enabled: bool,
}

/// A question from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub question: QuestionCore,
}

impl Deref for Question {
    type Target = QuestionCore;

    fn deref(&self) -> &Self::Target {
        &self.question
    }
}
