//! A small, fully seeded election shared by the engine and route tests.

use chrono::Utc;
use rocket::{http::Cookie, local::asynchronous::Client};

use crate::engine::{casting::cast_ballot, record::IntegrityKey};
use crate::error::Result;
use crate::model::{
    api::{
        auth::{Admin, AuthToken},
        ballot::{BallotEntry, VoteReceipt},
    },
    common::{hierarchy::OfficeHierarchy, tier::SeniorityTier},
    db::{
        candidacy::{Candidacy, CandidacyCore},
        election::Election,
        member::{Member, MemberCore},
        office::{Office, OfficeCore},
        vote::OriginMetadata,
    },
    mongodb::Id,
};
use crate::store::MemoryStore;
use crate::Config;

pub const INTEGRITY_SECRET: &str = "integrity-test-secret";

/// An open election with:
/// - a mandatory President, contested by two Senior members numbered "1" and "2";
/// - a Delegate, open to all tiers, contested by one Junior member numbered "7";
/// - an Associate voter who has not voted yet.
pub struct Scenario {
    pub store: MemoryStore,
    pub key: IntegrityKey,
    pub election: Election,
    pub president: Office,
    pub delegate: Office,
    /// President "1", President "2", Delegate "7".
    pub candidacies: Vec<Candidacy>,
    pub voter: Member,
}

impl Scenario {
    pub async fn new() -> Self {
        Self::seed(MemoryStore::new()).await
    }

    /// Seed the scenario into an existing store.
    /// The store is shared, so a Rocket instance built over a clone sees the same data.
    pub async fn seed(store: MemoryStore) -> Self {
        let election = Election::open_example();

        let mut president = Office::new(OfficeCore::new(
            election.id,
            "President",
            OfficeHierarchy::Executive,
        ));
        president.mandatory = true;
        let mut delegate = Office::new(OfficeCore::new(
            election.id,
            "Delegate",
            OfficeHierarchy::Representative,
        ));
        delegate.display_order = 1;

        let seniors = [
            Member::new(MemberCore::new(SeniorityTier::Senior)),
            Member::new(MemberCore::new(SeniorityTier::Senior)),
        ];
        let junior = Member::new(MemberCore::new(SeniorityTier::Junior));
        let voter = Member::new(MemberCore::new(SeniorityTier::Associate));

        let mut candidacies = vec![
            Candidacy::new(CandidacyCore::new(&seniors[0], &president, "1").unwrap()),
            Candidacy::new(CandidacyCore::new(&seniors[1], &president, "2").unwrap()),
            Candidacy::new(CandidacyCore::new(&junior, &delegate, "7").unwrap()),
        ];
        for candidacy in &mut candidacies {
            candidacy.approved = true;
        }

        store.insert_election(election.clone()).await;
        store.insert_office(president.clone()).await;
        store.insert_office(delegate.clone()).await;
        for member in seniors.iter().chain([&junior, &voter]) {
            store.insert_member(member.clone()).await;
        }
        for candidacy in &candidacies {
            store.insert_candidacy(candidacy.clone()).await;
        }

        Self {
            store,
            key: IntegrityKey::new(INTEGRITY_SECRET),
            election,
            president,
            delegate,
            candidacies,
            voter,
        }
    }

    /// President "1", blank for Delegate.
    pub fn full_ballot(&self) -> Vec<BallotEntry> {
        vec![
            BallotEntry::candidate(self.president.id, self.candidacies[0].id),
            BallotEntry::blank(self.delegate.id),
        ]
    }

    /// Add another active member of the given tier.
    pub async fn add_voter(&self, tier: SeniorityTier) -> Member {
        let member = Member::new(MemberCore::new(tier));
        self.store.insert_member(member.clone()).await;
        member
    }

    pub async fn cast(&self, voter: &Member, entries: &[BallotEntry]) -> Result<Vec<VoteReceipt>> {
        cast_ballot(
            &self.store,
            &self.key,
            voter.id,
            self.election.id,
            entries,
            OriginMetadata::default(),
            Utc::now(),
        )
        .await
    }
}

/// An auth cookie for `member`, signed with the client's configured secret.
pub fn member_cookie(client: &Client, member: &Member) -> Cookie<'static> {
    AuthToken::new(member).into_cookie(client_config(client))
}

/// An auth cookie for a fresh administrator.
pub fn admin_cookie(client: &Client) -> Cookie<'static> {
    AuthToken::new(&Admin { id: Id::new() }).into_cookie(client_config(client))
}

fn client_config(client: &Client) -> &Config {
    client.rocket().state::<Config>().unwrap()
}
