use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::{eligibility::EligibilitySet, election::ElectionStatus, hierarchy::OfficeHierarchy},
    db::{
        candidacy::Candidacy,
        election::Election,
        office::{Office, OfficeCategory},
    },
};

/// Everything a voter needs to fill in a ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: ElectionStatus,
    pub categories: Vec<CategoryDescription>,
    /// In ballot order.
    pub offices: Vec<OfficeDescription>,
}

impl ElectionDescription {
    /// Describe an election. Only standing candidacies are listed, and only
    /// categories used by at least one office.
    pub fn new(
        election: &Election,
        now: DateTime<Utc>,
        categories: &[OfficeCategory],
        offices: &[Office],
        candidacies: &[Candidacy],
    ) -> Self {
        let categories = categories
            .iter()
            .filter(|category| offices.iter().any(|o| o.category_id == Some(category.id)))
            .map(|category| CategoryDescription {
                id: category.id.into(),
                name: category.name.clone(),
                display_order: category.display_order,
            })
            .collect();
        let offices = offices
            .iter()
            .map(|office| OfficeDescription::new(office, candidacies))
            .collect();
        Self {
            id: election.id.into(),
            name: election.name.clone(),
            start_time: election.start_time,
            end_time: election.end_time,
            status: election.status_at(now),
            categories,
            offices,
        }
    }
}

/// Lifecycle view of an election, returned by the administrative transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    pub id: ApiId,
    pub name: String,
    pub status: ElectionStatus,
    pub active: bool,
    pub activated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl ElectionSummary {
    pub fn new(election: &Election, now: DateTime<Utc>) -> Self {
        Self {
            id: election.id.into(),
            name: election.name.clone(),
            status: election.status_at(now),
            active: election.active,
            activated_at: election.activated_at.map(|at| at.to_chrono()),
            closed_at: election.closed_at.map(|at| at.to_chrono()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDescription {
    pub id: ApiId,
    pub name: String,
    pub display_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficeDescription {
    pub id: ApiId,
    pub category_id: Option<ApiId>,
    pub name: String,
    pub display_order: u32,
    pub hierarchy: OfficeHierarchy,
    pub eligibility: EligibilitySet,
    pub voting_restriction: Option<EligibilitySet>,
    pub mandatory: bool,
    pub allow_blank: bool,
    pub candidacies: Vec<CandidacyDescription>,
}

impl OfficeDescription {
    fn new(office: &Office, candidacies: &[Candidacy]) -> Self {
        let candidacies = candidacies
            .iter()
            .filter(|candidacy| candidacy.office_id == office.id && candidacy.is_standing())
            .map(|candidacy| CandidacyDescription {
                id: candidacy.id.into(),
                member_id: candidacy.member_id.into(),
                number: candidacy.number.clone(),
            })
            .collect();
        Self {
            id: office.id.into(),
            category_id: office.category_id.map(Into::into),
            name: office.name.clone(),
            display_order: office.display_order,
            hierarchy: office.hierarchy,
            eligibility: office.eligibility.clone(),
            voting_restriction: office.voting_restriction.clone(),
            mandatory: office.mandatory,
            allow_blank: office.allow_blank,
            candidacies,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidacyDescription {
    pub id: ApiId,
    pub member_id: ApiId,
    pub number: String,
}

/// Whether a member has voted, and on which offices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStatus {
    pub election_id: ApiId,
    pub voted: bool,
    pub offices: Vec<ApiId>,
}
