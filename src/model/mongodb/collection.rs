use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{Answer, Campaign, Question, Response, ResponseAnswer};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Campaign collections
const CAMPAIGNS: &str = "campaigns";
impl MongoCollection for Campaign {
    const NAME: &'static str = CAMPAIGNS;
}

// Question collections
const QUESTIONS: &str = "questions";
impl MongoCollection for Question {
    const NAME: &'static str = QUESTIONS;
}

// Answer collections
const ANSWERS: &str = "answers";
impl MongoCollection for Answer {
    const NAME: &'static str = ANSWERS;
}

// Response collections
const RESPONSES: &str = "responses";
impl MongoCollection for Response {
    const NAME: &'static str = RESPONSES;
}

// Response-answer link collections
const RESPONSE_ANSWERS: &str = "response_answers";
impl MongoCollection for ResponseAnswer {
    const NAME: &'static str = RESPONSE_ANSWERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// The unique response index is what makes the "already responded" check
/// race-free: two concurrent submissions for the same user and question cannot
/// both insert.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Response collection.
    let response_index = IndexModel::builder()
        .keys(doc! {"user_id": 1, "question_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Response>::from_db(db)
        .create_index(response_index, None)
        .await?;

    // Response-answer collection.
    let link_index = IndexModel::builder()
        .keys(doc! {"response_id": 1, "answer_id": 1})
        .options(unique.clone())
        .build();
    Coll::<ResponseAnswer>::from_db(db)
        .create_index(link_index, None)
        .await?;

    // Lookup indexes for eligibility queries.
    let question_index = IndexModel::builder()
        .keys(doc! {"campaign_id": 1, "enabled": 1})
        .build();
    Coll::<Question>::from_db(db)
        .create_index(question_index, None)
        .await?;

    let answer_index = IndexModel::builder()
        .keys(doc! {"question_id": 1, "enabled": 1})
        .build();
    Coll::<Answer>::from_db(db)
        .create_index(answer_index, None)
        .await?;

    Ok(())
}
