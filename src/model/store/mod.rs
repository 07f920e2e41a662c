//! The storage collaborator the survey core reads from and writes through.
//!
//! Campaigns, questions and answers are only ever read here; responses and
//! their answer links are only ever inserted, and only inside a
//! [`ResponseTransaction`].

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    db::{Answer, Campaign, NewResponse, NewResponseAnswer, Question, Response, ResponseAnswer},
    mongodb::Id,
};

#[cfg(test)]
mod memory;
mod mongo;

#[cfg(test)]
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// The store as held in managed state.
pub type Store = Arc<dyn SurveyStore>;

#[rocket::async_trait]
pub trait SurveyStore: Send + Sync {
    /// Enabled campaigns whose window contains `now`.
    async fn active_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>>;

    /// Enabled questions belonging to any of the given campaigns.
    async fn enabled_questions(&self, campaign_ids: &[Id]) -> Result<Vec<Question>>;

    /// IDs of every question the user has a response for.
    async fn answered_question_ids(&self, user_id: &str) -> Result<HashSet<Id>>;

    async fn question(&self, id: Id) -> Result<Option<Question>>;

    /// Enabled answers offered for the given question.
    async fn enabled_answers(&self, question_id: Id) -> Result<Vec<Answer>>;

    async fn has_responded(&self, user_id: &str, question_id: Id) -> Result<bool>;

    /// Start a unit of work for recording one response.
    async fn begin(&self) -> Result<Box<dyn ResponseTransaction>>;
}

/// All writes of a single submission. Nothing is visible to other readers
/// until [`ResponseTransaction::commit`] succeeds; dropping the transaction
/// without committing discards every write.
#[rocket::async_trait]
pub trait ResponseTransaction: Send {
    /// Insert the response. Fails with a conflict if the user has already
    /// responded to the question, including via a concurrent transaction.
    async fn insert_response(&mut self, response: &NewResponse) -> Result<Response>;

    /// Look up any answer, enabled or not, by ID.
    async fn answer(&mut self, id: Id) -> Result<Option<Answer>>;

    async fn insert_response_answers(
        &mut self,
        links: &[NewResponseAnswer],
    ) -> Result<Vec<ResponseAnswer>>;

    async fn commit(&mut self) -> Result<()>;

    async fn abort(&mut self) -> Result<()>;
}
