use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// What a single vote records for a single office.
/// Exactly one of these, always.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VoteOutcome {
    /// A vote for the given candidacy.
    Candidate { candidacy_id: Id },
    /// A deliberate blank vote.
    Blank,
    /// A deliberately spoiled vote.
    Null,
}

/// The outcome kind without any candidate identity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Candidate,
    Blank,
    Null,
}

impl VoteOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Candidate { .. } => OutcomeKind::Candidate,
            Self::Blank => OutcomeKind::Blank,
            Self::Null => OutcomeKind::Null,
        }
    }

    pub fn candidacy_id(&self) -> Option<Id> {
        match self {
            Self::Candidate { candidacy_id } => Some(*candidacy_id),
            Self::Blank | Self::Null => None,
        }
    }

    /// Canonical bytes fed into the integrity hash.
    /// A one-byte tag, followed by the candidacy ID for candidate votes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Candidate { candidacy_id } => {
                let mut bytes = vec![b'C'];
                bytes.extend(candidacy_id.to_bytes());
                bytes
            }
            Self::Blank => vec![b'B'],
            Self::Null => vec![b'N'],
        }
    }
}
