//! Explicit election transitions. Everything else is derived at read time.

use chrono::{DateTime, Utc};

use crate::engine::casting::existing_election;
use crate::error::{Result, StateError};
use crate::model::{api::election::ElectionDescription, db::election::Election, mongodb::Id};
use crate::store::BallotStore;

/// Open an election for voting from its start time.
/// At most one election may be active; a stale flag left by an election
/// whose window has ended is cleared in the same write.
pub async fn activate_election(
    store: &dyn BallotStore,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<Election> {
    let election = existing_election(store, election_id).await?;
    if !election.can_activate(now) {
        return Err(StateError::CannotActivate {
            election_id: election_id.into(),
            status: election.status_at(now),
        }
        .into());
    }
    let election = store.activate_election(election_id, now).await?;
    info!("Activated election {election_id} ({})", election.name);
    Ok(election)
}

/// Close an election for good.
pub async fn close_election(
    store: &dyn BallotStore,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<Election> {
    let election = existing_election(store, election_id).await?;
    if election.closed_at.is_some() {
        return Err(StateError::AlreadyClosed {
            election_id: election_id.into(),
        }
        .into());
    }
    let election = store.close_election(election_id, now).await?;
    info!("Closed election {election_id} ({})", election.name);
    Ok(election)
}

/// Describe an election and its ballot as it stands at `now`.
pub async fn describe_election(
    store: &dyn BallotStore,
    election_id: Id,
    now: DateTime<Utc>,
) -> Result<ElectionDescription> {
    let election = existing_election(store, election_id).await?;
    let categories = store.office_categories().await?;
    let offices = store.offices(election_id).await?;
    let candidacies = store.candidacies(election_id).await?;
    Ok(ElectionDescription::new(
        &election,
        now,
        &categories,
        &offices,
        &candidacies,
    ))
}
