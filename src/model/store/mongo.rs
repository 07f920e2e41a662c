use std::collections::HashSet;

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, DateTime as BsonDateTime},
    error::Error as DbError,
    options::FindOptions,
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    db::{Answer, Campaign, NewResponse, NewResponseAnswer, Question, Response, ResponseAnswer},
    mongodb::{is_duplicate_key_error, is_write_conflict_error, Coll, Id},
    survey::{Rule, Violations},
};

use super::{ResponseTransaction, SurveyStore};

/// [`SurveyStore`] backed by a MongoDB replica set.
///
/// Transactions need a replica set (or sharded cluster); a standalone server
/// will reject [`SurveyStore::begin`].
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    campaigns: Coll<Campaign>,
    questions: Coll<Question>,
    answers: Coll<Answer>,
    responses: Coll<Response>,
    response_answers: Coll<ResponseAnswer>,
}

impl MongoStore {
    pub fn new(client: Client, db: &Database) -> Self {
        Self {
            client,
            campaigns: Coll::from_db(db),
            questions: Coll::from_db(db),
            answers: Coll::from_db(db),
            responses: Coll::from_db(db),
            response_answers: Coll::from_db(db),
        }
    }
}

#[rocket::async_trait]
impl SurveyStore for MongoStore {
    async fn active_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let now = BsonDateTime::from_chrono(now);
        let filter = doc! {
            "enabled": true,
            "start_date": { "$lte": now },
            "end_date": { "$gt": now },
        };
        let campaigns = self
            .campaigns
            .find(filter, None)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(campaigns)
    }

    async fn enabled_questions(&self, campaign_ids: &[Id]) -> Result<Vec<Question>> {
        let filter = doc! {
            "campaign_id": { "$in": campaign_ids.to_vec() },
            "enabled": true,
        };
        let questions = self
            .questions
            .find(filter, None)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(questions)
    }

    async fn answered_question_ids(&self, user_id: &str) -> Result<HashSet<Id>> {
        let filter = doc! {
            "user_id": user_id,
        };
        let answered = self
            .responses
            .find(filter, None)
            .await?
            .map_ok(|response| response.question_id)
            .try_collect::<HashSet<_>>()
            .await?;
        Ok(answered)
    }

    async fn question(&self, id: Id) -> Result<Option<Question>> {
        Ok(self.questions.find_one(id.as_doc(), None).await?)
    }

    async fn enabled_answers(&self, question_id: Id) -> Result<Vec<Answer>> {
        let filter = doc! {
            "question_id": question_id,
            "enabled": true,
        };
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let answers = self
            .answers
            .find(filter, options)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(answers)
    }

    async fn has_responded(&self, user_id: &str, question_id: Id) -> Result<bool> {
        let filter = doc! {
            "user_id": user_id,
            "question_id": question_id,
        };
        Ok(self.responses.find_one(filter, None).await?.is_some())
    }

    async fn begin(&self) -> Result<Box<dyn ResponseTransaction>> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        Ok(Box::new(MongoTransaction {
            session,
            answers: self.answers.clone(),
            responses: self.responses.clone(),
            response_answers: self.response_answers.clone(),
        }))
    }
}

/// A MongoDB multi-document transaction. The driver aborts the transaction
/// when the session is dropped uncommitted.
struct MongoTransaction {
    session: ClientSession,
    answers: Coll<Answer>,
    responses: Coll<Response>,
    response_answers: Coll<ResponseAnswer>,
}

/// Map a lost race on the response index to a conflict.
///
/// A committed duplicate fails the insert with a duplicate key error. A
/// duplicate still inside another open transaction fails it with a write
/// conflict instead.
fn conflict_on_duplicate(err: DbError, response: &NewResponse) -> Error {
    if is_duplicate_key_error(&err) || is_write_conflict_error(&err) {
        Error::Conflict(Violations::single(
            Rule::UserAlreadyResponded,
            format!(
                "User {} has already responded to question {}.",
                response.user_id, response.question_id
            ),
        ))
    } else {
        err.into()
    }
}

#[rocket::async_trait]
impl ResponseTransaction for MongoTransaction {
    async fn insert_response(&mut self, response: &NewResponse) -> Result<Response> {
        let response = Response {
            id: Id::new(),
            response: response.clone(),
        };
        self.responses
            .insert_one_with_session(&response, None, &mut self.session)
            .await
            .map_err(|e| conflict_on_duplicate(e, &response))?;
        Ok(response)
    }

    async fn answer(&mut self, id: Id) -> Result<Option<Answer>> {
        Ok(self
            .answers
            .find_one_with_session(id.as_doc(), None, &mut self.session)
            .await?)
    }

    async fn insert_response_answers(
        &mut self,
        links: &[NewResponseAnswer],
    ) -> Result<Vec<ResponseAnswer>> {
        if links.is_empty() {
            return Ok(Vec::new());
        }
        let links = links
            .iter()
            .map(|link| ResponseAnswer {
                id: Id::new(),
                link: link.clone(),
            })
            .collect::<Vec<_>>();
        self.response_answers
            .insert_many_with_session(&links, None, &mut self.session)
            .await?;
        Ok(links)
    }

    async fn commit(&mut self) -> Result<()> {
        self.session.commit_transaction().await?;
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        self.session.abort_transaction().await?;
        Ok(())
    }
}
