use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{
    db::{member::Member, office::Office},
    mongodb::Id,
};

/// Core candidacy data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidacyCore {
    /// Foreign Key election ID.
    pub election_id: Id,
    /// Foreign Key office ID.
    pub office_id: Id,
    /// Foreign Key member ID of the candidate.
    pub member_id: Id,
    /// Ballot number, unique within the office.
    pub number: String,
    /// Has the candidacy been approved by the electoral committee?
    pub approved: bool,
    /// Withdrawn candidacies are inactive.
    pub active: bool,
}

impl CandidacyCore {
    /// Create a pending (unapproved) candidacy.
    /// Returns `None` if the member is inactive or their tier may not run for the office.
    pub fn new(member: &Member, office: &Office, number: impl Into<String>) -> Option<Self> {
        if !member.active || !office.can_run_for(member.tier) {
            return None;
        }
        Some(Self {
            election_id: office.election_id,
            office_id: office.id,
            member_id: member.id,
            number: number.into(),
            approved: false,
            active: true,
        })
    }

    /// Is this candidacy currently on the ballot?
    pub fn is_standing(&self) -> bool {
        self.approved && self.active
    }
}

/// A candidacy without an ID.
pub type NewCandidacy = CandidacyCore;

/// A candidacy from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidacy {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidacy: CandidacyCore,
}

impl Candidacy {
    pub fn new(candidacy: CandidacyCore) -> Self {
        Self {
            id: Id::new(),
            candidacy,
        }
    }
}

impl Deref for Candidacy {
    type Target = CandidacyCore;

    fn deref(&self) -> &Self::Target {
        &self.candidacy
    }
}

impl DerefMut for Candidacy {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidacy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        common::{hierarchy::OfficeHierarchy, tier::SeniorityTier},
        db::{member::MemberCore, office::OfficeCore},
    };

    #[test]
    fn ineligible_member_cannot_stand() {
        let office = Office::new(OfficeCore::new(Id::new(), "President", OfficeHierarchy::Executive));
        let junior = Member::new(MemberCore::new(SeniorityTier::Junior));
        assert!(CandidacyCore::new(&junior, &office, "10").is_none());

        let senior = Member::new(MemberCore::new(SeniorityTier::Senior));
        let candidacy = CandidacyCore::new(&senior, &office, "10").unwrap();
        assert_eq!(candidacy.office_id, office.id);
        assert!(!candidacy.is_standing());
    }

    #[test]
    fn inactive_member_cannot_stand() {
        let office = Office::new(OfficeCore::new(Id::new(), "Delegate", OfficeHierarchy::Representative));
        let mut member = Member::new(MemberCore::new(SeniorityTier::Senior));
        member.active = false;
        assert!(CandidacyCore::new(&member, &office, "1").is_none());
    }
}
