//! Structural and referential validation of a submitted ballot.
//!
//! Validation is all-or-nothing: any problem in any entry voids the whole
//! submission, and every problem found is reported at once.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::model::{
    api::{ballot::BallotEntry, id::ApiId},
    common::{eligibility::is_electable, outcome::VoteOutcome},
    db::{candidacy::Candidacy, election::Election, member::Member, office::Office},
    mongodb::Id,
};

/// Why an entry (or the ballot as a whole) was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("ballot has no entries")]
    EmptyBallot,
    #[error("office appears more than once")]
    DuplicateOffice,
    #[error("no choice made")]
    NoOutcome,
    #[error("more than one of candidate, blank and null chosen")]
    MultipleOutcomes,
    #[error("office does not accept blank votes")]
    BlankNotAllowed,
    #[error("mandatory office missing from ballot")]
    MissingMandatoryOffice,
    #[error("office does not exist in this election")]
    UnknownOffice,
    #[error("office has no eligible candidates and cannot be contested")]
    OfficeNotElectable,
    #[error("member may not vote for this office")]
    VoterNotEligible,
    #[error("candidacy does not exist in this election")]
    UnknownCandidacy,
    #[error("candidacy belongs to a different office")]
    CandidacyWrongOffice,
    #[error("candidacy has not been approved")]
    CandidacyNotApproved,
    #[error("candidacy has been withdrawn")]
    CandidacyInactive,
    #[error("candidate is no longer eligible for this office")]
    CandidateNotEligible,
}

impl RejectReason {
    /// Is this a problem with the shape of the ballot itself, rather than
    /// with what it refers to?
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::EmptyBallot
                | Self::DuplicateOffice
                | Self::NoOutcome
                | Self::MultipleOutcomes
                | Self::BlankNotAllowed
                | Self::MissingMandatoryOffice
        )
    }
}

/// A single problem, located by entry index and/or office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryError {
    /// Position of the offending entry in the submission, if it concerns one.
    pub index: Option<usize>,
    /// The office concerned, if known.
    pub office: Option<ApiId>,
    pub reason: RejectReason,
}

impl EntryError {
    pub fn new(index: Option<usize>, office: Option<Id>, reason: RejectReason) -> Self {
        Self {
            index,
            office: office.map(Into::into),
            reason,
        }
    }
}

impl Display for EntryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(index) = self.index {
            write!(f, "entry {index}: ")?;
        }
        if let Some(office) = self.office {
            write!(f, "office {office}: ")?;
        }
        write!(f, "{}", self.reason)
    }
}

/// A ballot that passed validation.
/// Only [`validate`] can construct one, so holding one is proof of validity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBallot {
    election_id: Id,
    entries: Vec<ValidatedEntry>,
}

/// One validated choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedEntry {
    pub office_id: Id,
    pub outcome: VoteOutcome,
}

impl ValidatedBallot {
    pub fn election_id(&self) -> Id {
        self.election_id
    }

    pub fn entries(&self) -> &[ValidatedEntry] {
        &self.entries
    }

    pub fn office_ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.entries.iter().map(|entry| entry.office_id)
    }
}

/// Everything the validator needs to know about the election and the voter.
pub struct BallotContext<'a> {
    pub election: &'a Election,
    pub voter: &'a Member,
    /// Offices of the election.
    pub offices: &'a [Office],
    /// Candidacies of the election.
    pub candidacies: &'a [Candidacy],
    /// Members standing in the candidacies above.
    pub candidates: &'a [Member],
    /// Offices the voter already has a committed vote for.
    pub already_voted: &'a HashSet<Id>,
}

/// Validate a raw ballot against the election's offices and candidacies.
pub fn validate(ctx: &BallotContext<'_>, entries: &[BallotEntry]) -> Result<ValidatedBallot> {
    let offices: HashMap<Id, &Office> = ctx
        .offices
        .iter()
        .filter(|office| office.election_id == ctx.election.id)
        .map(|office| (office.id, office))
        .collect();
    let candidacies: HashMap<Id, &Candidacy> = ctx
        .candidacies
        .iter()
        .filter(|candidacy| candidacy.election_id == ctx.election.id)
        .map(|candidacy| (candidacy.id, candidacy))
        .collect();
    let candidates: HashMap<Id, &Member> = ctx
        .candidates
        .iter()
        .map(|member| (member.id, member))
        .collect();

    let mut errors = Vec::new();
    let mut validated = Vec::with_capacity(entries.len());
    let mut seen = HashSet::new();

    if entries.is_empty() {
        errors.push(EntryError::new(None, None, RejectReason::EmptyBallot));
    }

    for (index, entry) in entries.iter().enumerate() {
        let office_id: Id = entry.office.into();
        let reject = |reason: RejectReason| EntryError::new(Some(index), Some(office_id), reason);

        if !seen.insert(office_id) {
            errors.push(reject(RejectReason::DuplicateOffice));
            continue;
        }

        // Report a malformed outcome even if the office is also bad.
        let outcome = entry
            .outcome()
            .map_err(|reason| errors.push(reject(reason)))
            .ok();

        let Some(office) = offices.get(&office_id) else {
            errors.push(reject(RejectReason::UnknownOffice));
            continue;
        };
        if !is_electable(office) {
            errors.push(reject(RejectReason::OfficeNotElectable));
            continue;
        }
        if !office.can_vote_for(ctx.voter.tier) {
            errors.push(reject(RejectReason::VoterNotEligible));
            continue;
        }
        let Some(outcome) = outcome else {
            continue;
        };

        let problem = match outcome {
            VoteOutcome::Blank if !office.allow_blank => Some(RejectReason::BlankNotAllowed),
            VoteOutcome::Blank | VoteOutcome::Null => None,
            VoteOutcome::Candidate { candidacy_id } => {
                check_candidacy(office, candidacies.get(&candidacy_id).copied(), &candidates)
            }
        };
        match problem {
            Some(reason) => errors.push(reject(reason)),
            None => validated.push(ValidatedEntry { office_id, outcome }),
        }
    }

    // Mandatory offices must be answered the first time the member votes on them.
    let mut missing = offices
        .values()
        .filter(|office| {
            office.mandatory
                && office.can_vote_for(ctx.voter.tier)
                && !ctx.already_voted.contains(&office.id)
                && !seen.contains(&office.id)
        })
        .collect::<Vec<_>>();
    missing.sort_by_key(|office| (office.display_order, office.id));
    errors.extend(
        missing
            .into_iter()
            .map(|office| EntryError::new(None, Some(office.id), RejectReason::MissingMandatoryOffice)),
    );

    if !errors.is_empty() {
        return Err(Error::from_entry_errors(errors));
    }

    Ok(ValidatedBallot {
        election_id: ctx.election.id,
        entries: validated,
    })
}

fn check_candidacy(
    office: &Office,
    candidacy: Option<&Candidacy>,
    candidates: &HashMap<Id, &Member>,
) -> Option<RejectReason> {
    let Some(candidacy) = candidacy else {
        return Some(RejectReason::UnknownCandidacy);
    };
    if candidacy.office_id != office.id {
        Some(RejectReason::CandidacyWrongOffice)
    } else if !candidacy.approved {
        Some(RejectReason::CandidacyNotApproved)
    } else if !candidacy.active {
        Some(RejectReason::CandidacyInactive)
    } else {
        match candidates.get(&candidacy.member_id) {
            Some(member) if office.can_run_for(member.tier) => None,
            _ => Some(RejectReason::CandidateNotEligible),
        }
    }
}
