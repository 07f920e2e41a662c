//! The survey core: who may answer what, and recording what they answered.

mod eligibility;
mod recorder;
pub mod rules;

pub use eligibility::eligible_questions;
pub use recorder::ResponseRecorder;
pub use rules::{Rule, Violation, Violations};
