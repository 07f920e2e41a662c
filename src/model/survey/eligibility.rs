use chrono::{DateTime, Utc};
use rocket::futures::future::try_join_all;

use crate::error::{Error, Result};
use crate::model::{
    api::{AnswerDescription, EligibleQuestion, QuestionDescription},
    auth::CapabilityTokens,
    db::Question,
    mongodb::Id,
    store::SurveyStore,
};

use super::rules::{self, Violations};

/// Every question `user_id` may answer at `now`, each with its enabled answers
/// and a freshly minted capability token.
///
/// A question is eligible if its campaign is active, it is enabled, and the
/// user has not responded to it yet. Tokens are minted concurrently.
pub async fn eligible_questions(
    store: &dyn SurveyStore,
    tokens: &CapabilityTokens,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<EligibleQuestion>> {
    if let Some(violation) = rules::user_id_is_present(user_id) {
        return Err(Error::Validation(Violations::from_iter([violation])));
    }

    let campaign_ids = store
        .active_campaigns(now)
        .await?
        .into_iter()
        .map(|campaign| campaign.id)
        .collect::<Vec<Id>>();
    if campaign_ids.is_empty() {
        return Ok(Vec::new());
    }

    let answered = store.answered_question_ids(user_id).await?;
    let open = store
        .enabled_questions(&campaign_ids)
        .await?
        .into_iter()
        .filter(|question| !answered.contains(&question.id))
        .collect::<Vec<_>>();

    let eligible = try_join_all(
        open.iter()
            .map(|question| describe(store, tokens, question, user_id)),
    )
    .await?;

    debug!(
        "{} eligible question(s) across {} active campaign(s)",
        eligible.len(),
        campaign_ids.len()
    );
    Ok(eligible)
}

async fn describe(
    store: &dyn SurveyStore,
    tokens: &CapabilityTokens,
    question: &Question,
    user_id: &str,
) -> Result<EligibleQuestion> {
    let answers = if question.question_type.is_input() {
        Vec::new()
    } else {
        store
            .enabled_answers(question.id)
            .await?
            .iter()
            .map(AnswerDescription::from)
            .collect()
    };
    let token = tokens.issue(question.id, user_id).await?;

    Ok(EligibleQuestion {
        question: QuestionDescription::from(question),
        answers,
        token,
    })
}
