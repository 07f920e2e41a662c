use argon2::Error as Argon2Error;
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::{serde_json::json, Json},
    Request,
};
use thiserror::Error;

use crate::model::survey::Violations;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(Violations),
    #[error("Conflict: {0}")]
    Conflict(Violations),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Construct an [`Error::NotFound`] for the given thing.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error maps to.
    pub fn status(&self) -> Status {
        match self {
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
            Self::Validation(_) => Status::UnprocessableEntity,
            Self::Conflict(_) => Status::Conflict,
            Self::Db(_) | Self::Argon2(_) | Self::Internal(_) => Status::InternalServerError,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            // Internal details stay in the log.
            error!("{self}");
        } else {
            debug!("{self}");
        }

        match self {
            Self::Validation(violations) | Self::Conflict(violations) => {
                (status, Json(violations)).respond_to(req)
            }
            Self::Unauthorized(msg) | Self::NotFound(msg) => {
                (status, Json(json!({ "error": msg }))).respond_to(req)
            }
            Self::Db(_) | Self::Argon2(_) | Self::Internal(_) => {
                (status, Json(json!({ "error": "Internal server error" }))).respond_to(req)
            }
        }
    }
}
