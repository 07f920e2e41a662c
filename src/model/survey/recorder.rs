use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{
    api::{RecordedResponse, ResponseDraft},
    auth::CapabilityTokens,
    db::{NewResponse, NewResponseAnswer},
    mongodb::Id,
    store::{ResponseTransaction, SurveyStore},
};

use super::rules::{
    answer_belongs_to_question, check_submission, user_id_is_present, SubmissionContext,
    Violations,
};

/// Validates submissions and records them atomically.
pub struct ResponseRecorder<'a> {
    store: &'a dyn SurveyStore,
    tokens: &'a CapabilityTokens,
}

impl<'a> ResponseRecorder<'a> {
    pub fn new(store: &'a dyn SurveyStore, tokens: &'a CapabilityTokens) -> Self {
        Self { store, tokens }
    }

    /// Record `draft`, authorized by `token`.
    ///
    /// Checks run in order and the first failing stage stops the submission:
    /// token and user present, token valid, question exists, then the batch
    /// of submission rules. The response and all its answer links are then
    /// written in a single transaction, so a bad answer reference leaves
    /// nothing behind.
    pub async fn submit(&self, token: &str, draft: ResponseDraft) -> Result<RecordedResponse> {
        if token.is_empty() {
            return Err(Error::Unauthorized("missing token".to_string()));
        }
        if let Some(violation) = user_id_is_present(&draft.user_id) {
            return Err(Error::Validation(Violations::from_iter([violation])));
        }
        let question_id: Id = draft.question_id.into();

        self.tokens
            .authorize(token, question_id, &draft.user_id)
            .await?;

        let question = self
            .store
            .question(question_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Question {question_id}")))?;

        let context = SubmissionContext {
            question: &question,
            already_responded: self
                .store
                .has_responded(&draft.user_id, question_id)
                .await?,
        };
        let violations = check_submission(&draft, &context);
        if !violations.is_empty() {
            warn!("Rejected response to question {question_id}: {violations}");
            return Err(violations.into_error());
        }

        let mut tx = self.store.begin().await?;
        let recorded = match record(tx.as_mut(), question_id, draft).await {
            Ok(recorded) => recorded,
            Err(e) => {
                if let Err(abort_err) = tx.abort().await {
                    warn!("Failed to abort response transaction: {abort_err}");
                }
                return Err(e);
            }
        };
        tx.commit().await?;

        info!(
            "Recorded response {} to question {question_id} with {} answer(s)",
            recorded.id,
            recorded.answers.len()
        );
        Ok(recorded)
    }
}

/// The writes of one submission, inside `tx`. Nothing here is visible until
/// the caller commits.
async fn record(
    tx: &mut dyn ResponseTransaction,
    question_id: Id,
    draft: ResponseDraft,
) -> Result<RecordedResponse> {
    let response = tx
        .insert_response(&NewResponse::new(question_id, draft.user_id, draft.text))
        .await?;

    // The same answer picked twice is one selection.
    let mut seen = HashSet::new();
    let answer_ids = draft
        .answer_ids
        .into_iter()
        .map(Id::from)
        .filter(|id| seen.insert(*id))
        .collect::<Vec<_>>();

    let mut violations = Violations::new();
    let mut answers = Vec::with_capacity(answer_ids.len());
    for answer_id in answer_ids {
        let answer = tx.answer(answer_id).await?;
        match answer_belongs_to_question(answer_id, answer.as_ref(), response.question_id) {
            Some(violation) => violations.extend([violation]),
            None => answers.extend(answer),
        }
    }
    if !violations.is_empty() {
        warn!("Rejected answers for question {question_id}: {violations}");
        return Err(Error::Validation(violations));
    }

    let links = answers
        .iter()
        .map(|answer| NewResponseAnswer {
            response_id: response.id,
            answer_id: answer.id,
            question_id: response.question_id,
        })
        .collect::<Vec<_>>();
    tx.insert_response_answers(&links).await?;

    Ok(RecordedResponse::new(&response, &answers))
}
