use std::collections::HashSet;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{
    db::{Answer, Campaign, NewResponse, NewResponseAnswer, Question, Response, ResponseAnswer},
    mongodb::Id,
    survey::{Rule, Violations},
};

use super::{ResponseTransaction, SurveyStore};

#[derive(Default)]
struct Tables {
    campaigns: Vec<Campaign>,
    questions: Vec<Question>,
    answers: Vec<Answer>,
    responses: Vec<Response>,
    response_answers: Vec<ResponseAnswer>,
}

impl Tables {
    fn has_responded(&self, user_id: &str, question_id: Id) -> bool {
        self.responses
            .iter()
            .any(|r| r.user_id == user_id && r.question_id == question_id)
    }
}

/// An in-process [`SurveyStore`] for tests. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryStore(Arc<Mutex<Tables>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.0.lock().unwrap()
    }

    pub fn insert_campaign(&self, campaign: Campaign) {
        self.tables().campaigns.push(campaign);
    }

    pub fn insert_question(&self, question: Question) {
        self.tables().questions.push(question);
    }

    pub fn insert_answer(&self, answer: Answer) {
        self.tables().answers.push(answer);
    }

    /// Every committed response.
    pub fn responses(&self) -> Vec<Response> {
        self.tables().responses.clone()
    }

    /// Every committed response-answer link.
    pub fn response_answers(&self) -> Vec<ResponseAnswer> {
        self.tables().response_answers.clone()
    }
}

fn already_responded(user_id: &str, question_id: Id) -> Error {
    Error::Conflict(Violations::single(
        Rule::UserAlreadyResponded,
        format!("User {user_id} has already responded to question {question_id}."),
    ))
}

#[rocket::async_trait]
impl SurveyStore for MemoryStore {
    async fn active_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        Ok(self
            .tables()
            .campaigns
            .iter()
            .filter(|c| c.is_active_at(now))
            .cloned()
            .collect())
    }

    async fn enabled_questions(&self, campaign_ids: &[Id]) -> Result<Vec<Question>> {
        Ok(self
            .tables()
            .questions
            .iter()
            .filter(|q| q.enabled && campaign_ids.contains(&q.campaign_id))
            .cloned()
            .collect())
    }

    async fn answered_question_ids(&self, user_id: &str) -> Result<HashSet<Id>> {
        Ok(self
            .tables()
            .responses
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.question_id)
            .collect())
    }

    async fn question(&self, id: Id) -> Result<Option<Question>> {
        Ok(self
            .tables()
            .questions
            .iter()
            .find(|q| q.id == id)
            .cloned())
    }

    async fn enabled_answers(&self, question_id: Id) -> Result<Vec<Answer>> {
        Ok(self
            .tables()
            .answers
            .iter()
            .filter(|a| a.enabled && a.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn has_responded(&self, user_id: &str, question_id: Id) -> Result<bool> {
        Ok(self.tables().has_responded(user_id, question_id))
    }

    async fn begin(&self) -> Result<Box<dyn ResponseTransaction>> {
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            responses: Vec::new(),
            response_answers: Vec::new(),
        }))
    }
}

/// Writes are staged locally and applied under one lock at commit, where the
/// uniqueness check is repeated so concurrent transactions cannot both win.
struct MemoryTransaction {
    store: MemoryStore,
    responses: Vec<Response>,
    response_answers: Vec<ResponseAnswer>,
}

#[rocket::async_trait]
impl ResponseTransaction for MemoryTransaction {
    async fn insert_response(&mut self, response: &NewResponse) -> Result<Response> {
        let staged = self
            .responses
            .iter()
            .any(|r| r.user_id == response.user_id && r.question_id == response.question_id);
        if staged
            || self
                .store
                .tables()
                .has_responded(&response.user_id, response.question_id)
        {
            return Err(already_responded(&response.user_id, response.question_id));
        }

        let response = Response {
            id: Id::new(),
            response: response.clone(),
        };
        self.responses.push(response.clone());
        Ok(response)
    }

    async fn answer(&mut self, id: Id) -> Result<Option<Answer>> {
        Ok(self
            .store
            .tables()
            .answers
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }

    async fn insert_response_answers(
        &mut self,
        links: &[NewResponseAnswer],
    ) -> Result<Vec<ResponseAnswer>> {
        let links = links
            .iter()
            .map(|link| ResponseAnswer {
                id: Id::new(),
                link: link.clone(),
            })
            .collect::<Vec<_>>();
        self.response_answers.extend(links.iter().cloned());
        Ok(links)
    }

    async fn commit(&mut self) -> Result<()> {
        let mut tables = self.store.tables();
        if let Some(duplicate) = self
            .responses
            .iter()
            .find(|r| tables.has_responded(&r.user_id, r.question_id))
        {
            let err = already_responded(&duplicate.user_id, duplicate.question_id);
            self.responses.clear();
            self.response_answers.clear();
            return Err(err);
        }
        tables.responses.append(&mut self.responses);
        tables
            .response_answers
            .extend(mem::take(&mut self.response_answers));
        Ok(())
    }

    async fn abort(&mut self) -> Result<()> {
        self.responses.clear();
        self.response_answers.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bobs_response(question_id: Id, text: &str) -> NewResponse {
        NewResponse::new(question_id, "bob".to_string(), text.to_string())
    }

    #[rocket::async_test]
    async fn second_commit_of_same_pair_conflicts() {
        let store = MemoryStore::new();
        let question_id = Id::new();

        // Both transactions stage their insert before either commits.
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first
            .insert_response(&bobs_response(question_id, "one"))
            .await
            .unwrap();
        second
            .insert_response(&bobs_response(question_id, "two"))
            .await
            .unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, Error::Conflict(v) if v.has(Rule::UserAlreadyResponded)));

        let responses = store.responses();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].text, "one");
    }

    #[rocket::async_test]
    async fn losing_commit_leaves_no_links() {
        let store = MemoryStore::new();
        let question_id = Id::new();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first
            .insert_response(&bobs_response(question_id, ""))
            .await
            .unwrap();
        let response = second
            .insert_response(&bobs_response(question_id, ""))
            .await
            .unwrap();
        second
            .insert_response_answers(&[NewResponseAnswer {
                response_id: response.id,
                answer_id: Id::new(),
                question_id,
            }])
            .await
            .unwrap();

        first.commit().await.unwrap();
        assert!(second.commit().await.is_err());
        assert!(store.response_answers().is_empty());
    }

    #[rocket::async_test]
    async fn aborted_writes_are_discarded() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_response(&bobs_response(Id::new(), "never mind"))
            .await
            .unwrap();
        tx.abort().await.unwrap();

        assert!(store.responses().is_empty());
    }
}
