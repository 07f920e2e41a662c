use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::logging::RequestId;
use crate::model::{
    api::EligibleQuestion, auth::CapabilityTokens, store::Store, survey::eligible_questions,
};

pub fn routes() -> Vec<Route> {
    routes![user_questions]
}

#[get("/users/<user_id>/questions")]
async fn user_questions(
    request_id: &RequestId,
    user_id: &str,
    store: &State<Store>,
    tokens: &State<CapabilityTokens>,
) -> Result<Json<Vec<EligibleQuestion>>> {
    let questions = eligible_questions(store.inner().as_ref(), tokens, user_id, Utc::now()).await?;
    debug!("{request_id}: offering {} question(s)", questions.len());
    Ok(Json(questions))
}
