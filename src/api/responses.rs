use rocket::{
    http::Status,
    response::status::Custom,
    serde::json::Json,
    Route, State,
};

use crate::error::Result;
use crate::logging::RequestId;
use crate::model::{
    api::{RecordedResponse, ResponseDraft},
    auth::CapabilityTokens,
    store::Store,
    survey::ResponseRecorder,
};

pub fn routes() -> Vec<Route> {
    routes![submit_response]
}

/// Record a response. The capability token handed out with the question is
/// passed in the query string.
#[post("/responses?<token>", data = "<draft>", format = "json")]
async fn submit_response(
    request_id: &RequestId,
    token: Option<&str>,
    draft: Json<ResponseDraft>,
    store: &State<Store>,
    tokens: &State<CapabilityTokens>,
) -> Result<Custom<Json<RecordedResponse>>> {
    let draft = draft.into_inner();
    let question_id = draft.question_id;

    let recorder = ResponseRecorder::new(store.inner().as_ref(), tokens);
    match recorder.submit(token.unwrap_or_default(), draft).await {
        Ok(recorded) => {
            info!(
                "{request_id}: recorded response {} to question {question_id}",
                recorded.id
            );
            Ok(Custom(Status::Accepted, Json(recorded)))
        }
        Err(e) => {
            warn!("{request_id}: rejected response to question {question_id}: {e}");
            Err(e)
        }
    }
}
