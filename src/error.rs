use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use rocket::{
    http::{Status, StatusClass},
    response::{status::Custom, Responder},
    serde::json::{serde_json, Json},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::validator::EntryError;
use crate::model::{api::id::ApiId, common::election::ElectionStatus};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The ballot is malformed. Nothing was persisted.
    #[error("Invalid ballot: {}", summarize(.0))]
    Validation(Vec<EntryError>),
    /// The ballot references something the member may not vote on or for. Nothing was persisted.
    #[error("Ineligible ballot: {}", summarize(.0))]
    Eligibility(Vec<EntryError>),
    /// The election or member is not in a state that permits the operation.
    #[error(transparent)]
    State(#[from] StateError),
    /// A uniqueness constraint rejected the write.
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    OidParse(#[from] mongodb::bson::oid::Error),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Classify a non-empty set of ballot problems.
    /// Any structural problem makes the whole set a validation failure.
    pub fn from_entry_errors(errors: Vec<EntryError>) -> Self {
        if errors.iter().any(|e| e.reason.is_structural()) {
            Self::Validation(errors)
        } else {
            Self::Eligibility(errors)
        }
    }

    /// Machine-readable category, also used as the `error` field of responses.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Eligibility(_) => "eligibility",
            Self::State(_) => "state",
            Self::Conflict(_) => "conflict",
            Self::Db(_) => "internal",
            Self::Jwt(_) | Self::Unauthorized(_) => "unauthorized",
            Self::OidParse(_) | Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::UnprocessableEntity,
            Self::Eligibility(_) => Status::Forbidden,
            Self::State(_) | Self::Conflict(_) => Status::Conflict,
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::OidParse(_) | Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::NotFound,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        let details = match self {
            Self::Validation(errors) | Self::Eligibility(errors) => serde_json::to_value(errors),
            Self::State(err) => serde_json::to_value(err),
            Self::Conflict(err) => serde_json::to_value(err),
            _ => return None,
        };
        details.ok()
    }
}

/// Problems with the lifecycle state of an election or member.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateError {
    #[error("Election {election_id} is {status}, not open for voting")]
    ElectionNotOpen {
        election_id: ApiId,
        status: ElectionStatus,
    },
    #[error("Member {member_id} is not active")]
    MemberInactive { member_id: ApiId },
    #[error("Election {election_id} cannot be activated while {status}")]
    CannotActivate {
        election_id: ApiId,
        status: ElectionStatus,
    },
    #[error("Election {election_id} is already closed")]
    AlreadyClosed { election_id: ApiId },
    #[error("Results of election {election_id} are not public while it is {status}")]
    ResultsNotPublished {
        election_id: ApiId,
        status: ElectionStatus,
    },
}

/// Writes rejected by a uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictError {
    /// The member already has a committed vote for one of the ballot's offices.
    /// `offices` may be empty when the conflict was only detected by the storage constraint.
    #[error("Member has already voted in election {election_id}")]
    AlreadyVoted {
        election_id: ApiId,
        offices: Vec<ApiId>,
    },
    #[error("Another election is already open")]
    AnotherElectionOpen,
    #[error("Vote {vote_id} has already been invalidated")]
    AlreadyInvalidated { vote_id: ApiId },
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            error!("{self}");
        } else {
            debug!("Request rejected: {self}");
        }
        let body = ErrorBody {
            error: self.category().to_string(),
            message: self.to_string(),
            details: self.details(),
        };
        Custom(status, Json(body)).respond_to(req)
    }
}

fn summarize(errors: &[EntryError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::validator::RejectReason;

    #[test]
    fn structural_problems_dominate() {
        let errors = vec![
            EntryError::new(Some(0), None, RejectReason::UnknownOffice),
            EntryError::new(Some(1), None, RejectReason::DuplicateOffice),
        ];
        let err = Error::from_entry_errors(errors);
        assert!(matches!(err, Error::Validation(ref e) if e.len() == 2));
        assert_eq!(err.status(), Status::UnprocessableEntity);
    }

    #[test]
    fn referential_problems_are_eligibility() {
        let errors = vec![EntryError::new(Some(0), None, RejectReason::CandidacyNotApproved)];
        let err = Error::from_entry_errors(errors);
        assert_eq!(err.category(), "eligibility");
        assert_eq!(err.status(), Status::Forbidden);
    }

    #[test]
    fn conflicts_and_state_are_distinct_categories() {
        let conflict: Error = ConflictError::AnotherElectionOpen.into();
        let state: Error = StateError::AlreadyClosed {
            election_id: crate::model::mongodb::Id::new().into(),
        }
        .into();
        assert_eq!(conflict.category(), "conflict");
        assert_eq!(state.category(), "state");
        assert_eq!(conflict.status(), Status::Conflict);
    }
}
