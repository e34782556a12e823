use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::election::ElectionStatus};

/// Votes received by one candidacy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCount {
    pub candidacy_id: ApiId,
    /// The candidate, if the candidacy is still on record.
    pub member_id: Option<ApiId>,
    /// Display number on the ballot.
    pub number: String,
    pub votes: u64,
}

/// Results for a single office.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfficeTally {
    pub office_id: ApiId,
    pub office_name: String,
    /// Ranked by votes, most first; ties broken by display number.
    pub candidates: Vec<CandidateCount>,
    pub blank: u64,
    /// Null votes, including invalidated ones.
    pub null: u64,
    /// Votes invalidated by an administrator. Already included in `null`.
    pub invalidated: u64,
    /// Every vote cast for the office.
    pub total: u64,
    pub distinct_voters: u64,
    /// Active members permitted to vote for the office.
    pub eligible_voters: u64,
    /// `distinct_voters / eligible_voters`, or zero when nobody is eligible.
    pub participation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionTally {
    pub election_id: ApiId,
    pub status: ElectionStatus,
    pub offices: Vec<OfficeTally>,
}
