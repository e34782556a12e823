//! The election engine: validation, casting, lifecycle, tallying and audit.
//!
//! Every operation takes the store and the current time explicitly.

pub mod audit;
pub mod casting;
pub mod lifecycle;
pub mod record;
pub mod tally;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::{
    audit_trail, invalidate_vote, published_audit_trail, verify_integrity, vote_records,
};
pub use casting::{cast_ballot, has_voted, has_voted_for_office, voted_offices};
pub use lifecycle::{activate_election, close_election, describe_election};
pub use record::IntegrityKey;
pub use tally::{get_published_tally, get_tally};
