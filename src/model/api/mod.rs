//! API-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are plain hex strings.
//! - Datetimes are RFC 3339 strings.

mod id;
pub use id::ApiId;

pub mod eligible;
pub use eligible::{AnswerDescription, EligibleQuestion, QuestionDescription};

pub mod submission;
pub use submission::{RecordedResponse, ResponseDraft};
