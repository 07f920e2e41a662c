//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod answer;
pub mod campaign;
pub mod question;
pub mod response;

pub use answer::{Answer, AnswerCore};
pub use campaign::{Campaign, CampaignCore};
pub use question::{Question, QuestionCore, QuestionType};
pub use response::{
    NewResponse, NewResponseAnswer, Response, ResponseAnswer, ResponseAnswerCore, ResponseCore,
};
