//! Building, sealing and projecting vote rows.

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use mongodb::bson::DateTime as BsonDateTime;
use sha2::Sha256;

use crate::model::{
    common::outcome::VoteOutcome,
    db::vote::{OriginMetadata, Vote, VoteCore},
    mongodb::Id,
};

type HmacSha256 = Hmac<Sha256>;

/// Server-side key for sealing votes.
#[derive(Clone)]
pub struct IntegrityKey(Vec<u8>);

impl IntegrityKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self(secret.as_ref().to_vec())
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0).expect("HMAC can take a key of any size")
    }

    fn digest(&self, vote: &VoteCore) -> HmacSha256 {
        let mut mac = self.mac();
        mac.update(&vote.election_id.to_bytes());
        mac.update(&vote.office_id.to_bytes());
        mac.update(&vote.member_id.to_bytes());
        mac.update(&vote.outcome.to_bytes());
        mac.update(&vote.cast_at.timestamp_millis().to_le_bytes());
        mac
    }

    /// Compute the hex integrity hash of a vote. The stored hash is ignored.
    pub fn seal(&self, vote: &VoteCore) -> String {
        HEXLOWER.encode(&self.digest(vote).finalize().into_bytes())
    }

    /// Does the stored hash match the vote's contents?
    pub fn verify(&self, vote: &VoteCore) -> bool {
        match HEXLOWER.decode(vote.integrity_hash.as_bytes()) {
            Ok(expected) => self.digest(vote).verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

/// Drop sub-millisecond precision, which the database cannot store.
pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    BsonDateTime::from_chrono(at).to_chrono()
}

/// Build sealed vote rows for a single submission.
/// Every row of one submission shares the same `cast_at`.
pub struct VoteBuilder<'k> {
    key: &'k IntegrityKey,
    election_id: Id,
    member_id: Id,
    cast_at: DateTime<Utc>,
    origin: OriginMetadata,
}

impl<'k> VoteBuilder<'k> {
    pub fn new(
        key: &'k IntegrityKey,
        election_id: Id,
        member_id: Id,
        cast_at: DateTime<Utc>,
        origin: OriginMetadata,
    ) -> Self {
        Self {
            key,
            election_id,
            member_id,
            cast_at: truncate_to_millis(cast_at),
            origin,
        }
    }

    pub fn build(&self, office_id: Id, outcome: VoteOutcome) -> Vote {
        let mut vote = VoteCore {
            election_id: self.election_id,
            office_id,
            member_id: self.member_id,
            outcome,
            integrity_hash: String::new(),
            cast_at: self.cast_at,
            origin: self.origin.clone(),
        };
        vote.integrity_hash = self.key.seal(&vote);
        Vote {
            id: Id::new(),
            vote,
        }
    }
}
