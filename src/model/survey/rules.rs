//! Business rules for submitted responses.
//!
//! Each rule is a pure function returning the violations it finds. Rules are
//! run as a batch so that a client gets every problem with its submission at
//! once rather than one per round trip.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer};

use crate::error::Error;
use crate::model::{
    api::ResponseDraft,
    db::{Answer, Question},
    mongodb::Id,
};

/// The rule a violation was raised by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    UserIdIsPresent,
    UserAlreadyResponded,
    IncorrectType,
    AnswerBelongsToQuestion,
}

/// A single broken rule, with a human-readable explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub rule: Rule,
    pub message: String,
}

impl Violation {
    pub fn new(rule: Rule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}

/// Every violation found while checking one submission.
///
/// Serializes as `{"errors": {"<rule>": ["<message>", ...]}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(rule: Rule, message: impl Into<String>) -> Self {
        Self(vec![Violation::new(rule, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Was the given rule broken at least once?
    pub fn has(&self, rule: Rule) -> bool {
        self.0.iter().any(|v| v.rule == rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    /// Turn a non-empty set of violations into the matching error: a conflict
    /// if the user has already responded, otherwise a validation failure.
    pub fn into_error(self) -> Error {
        if self.has(Rule::UserAlreadyResponded) {
            Error::Conflict(self)
        } else {
            Error::Validation(self)
        }
    }
}

impl Extend<Violation> for Violations {
    fn extend<I: IntoIterator<Item = Violation>>(&mut self, iter: I) {
        self.0.extend(iter)
    }
}

impl FromIterator<Violation> for Violations {
    fn from_iter<I: IntoIterator<Item = Violation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Display for Violations {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let messages = self
            .0
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>();
        write!(f, "{}", messages.join("; "))
    }
}

impl Serialize for Violations {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Report<'a> {
            errors: BTreeMap<Rule, Vec<&'a str>>,
        }

        let mut errors: BTreeMap<Rule, Vec<&str>> = BTreeMap::new();
        for violation in &self.0 {
            errors
                .entry(violation.rule)
                .or_default()
                .push(&violation.message);
        }
        Report { errors }.serialize(serializer)
    }
}

/// What the submission rules know about the world besides the draft itself.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionContext<'a> {
    pub question: &'a Question,
    pub already_responded: bool,
}

/// A rule over a whole submission.
pub type SubmissionRule = fn(&ResponseDraft, &SubmissionContext<'_>) -> Vec<Violation>;

/// The submission rules, in reporting order.
pub const SUBMISSION_RULES: &[SubmissionRule] = &[user_already_responded, incorrect_type];

/// Run every submission rule and collect the results.
pub fn check_submission(draft: &ResponseDraft, context: &SubmissionContext<'_>) -> Violations {
    SUBMISSION_RULES
        .iter()
        .flat_map(|rule| rule(draft, context))
        .collect()
}

/// The user ID must not be empty.
pub fn user_id_is_present(user_id: &str) -> Option<Violation> {
    user_id
        .is_empty()
        .then(|| Violation::new(Rule::UserIdIsPresent, "UserID can not be blank."))
}

/// A user may respond to each question at most once.
pub fn user_already_responded(
    draft: &ResponseDraft,
    context: &SubmissionContext<'_>,
) -> Vec<Violation> {
    if context.already_responded {
        vec![Violation::new(
            Rule::UserAlreadyResponded,
            format!(
                "User {} has already responded to question {}.",
                draft.user_id, draft.question_id
            ),
        )]
    } else {
        Vec::new()
    }
}

/// Input questions take text and no answers; choice questions take answers and
/// no text.
///
/// This does not check that a single-choice question gets exactly one answer.
pub fn incorrect_type(draft: &ResponseDraft, context: &SubmissionContext<'_>) -> Vec<Violation> {
    let mut violations = Vec::new();
    let has_text = !draft.text.is_empty();
    let has_answers = !draft.answer_ids.is_empty();

    if context.question.question_type.is_input() {
        if !has_text {
            violations.push(Violation::new(
                Rule::IncorrectType,
                "Missing response text for input type",
            ));
        }
        if has_answers {
            violations.push(Violation::new(
                Rule::IncorrectType,
                "Response answers are not allowed for input type",
            ));
        }
    } else {
        if has_text {
            violations.push(Violation::new(
                Rule::IncorrectType,
                "Response text is not allowed for non-input type",
            ));
        }
        if !has_answers {
            violations.push(Violation::new(
                Rule::IncorrectType,
                format!(
                    "At least one answer is required for {} type",
                    context.question.question_type
                ),
            ));
        }
    }

    violations
}

/// The selected answer must exist and belong to the question being answered.
pub fn answer_belongs_to_question(
    answer_id: Id,
    answer: Option<&Answer>,
    question_id: Id,
) -> Option<Violation> {
    match answer {
        None => Some(Violation::new(
            Rule::AnswerBelongsToQuestion,
            format!("Answer {answer_id} not found"),
        )),
        Some(answer) if answer.question_id != question_id => Some(Violation::new(
            Rule::AnswerBelongsToQuestion,
            format!("Answer {answer_id} does not belong to question {question_id}"),
        )),
        Some(_) => None,
    }
}
