use std::collections::HashSet;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, Bson, DateTime as BsonDateTime, Document},
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, Database,
};
use rocket::{futures::TryStreamExt, tokio::time::sleep};
use serde::de::DeserializeOwned;

use super::BallotStore;
use crate::error::{ConflictError, Error, Result, StateError};
use crate::model::{
    db::{
        candidacy::Candidacy,
        election::Election,
        invalidation::VoteInvalidation,
        member::Member,
        office::{Office, OfficeCategory},
        vote::Vote,
    },
    mongodb::{is_duplicate_key_error, is_transient_transaction_error, Coll, Id, MongoCollection},
};

/// How long a transaction aborted by transient errors keeps being retried.
/// Concurrent ballots from one member abort each other with write conflicts
/// until one of them commits, after which the rest fail on the unique index.
const TRANSACTION_RETRY_DEADLINE: Duration = Duration::from_secs(10);

const FIRST_RETRY_DELAY: Duration = Duration::from_millis(5);

const MAX_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Exponential backoff, capped at [`MAX_RETRY_DELAY`].
fn retry_delay(retries: u32) -> Duration {
    FIRST_RETRY_DELAY
        .saturating_mul(2u32.saturating_pow(retries))
        .min(MAX_RETRY_DELAY)
}

/// Run a transaction until it succeeds, fails for good, or keeps failing
/// transiently past [`TRANSACTION_RETRY_DEADLINE`].
/// Duplicate key errors are never retried.
async fn retry_transient<T, F, Fut>(what: &str, mut transaction: F) -> std::result::Result<T, DbError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, DbError>>,
{
    let deadline = Instant::now() + TRANSACTION_RETRY_DEADLINE;
    let mut retries = 0;
    loop {
        match transaction().await {
            Err(err)
                if !is_duplicate_key_error(&err)
                    && is_transient_transaction_error(&err)
                    && Instant::now() < deadline =>
            {
                let delay = retry_delay(retries);
                debug!("Retrying {what} in {delay:?} after transient error: {err}");
                sleep(delay).await;
                retries += 1;
            }
            result => {
                if retries > 0 {
                    info!("Finished {what} after {retries} retries");
                }
                return result;
            }
        }
    }
}

/// The production store.
/// Multi-document writes run inside MongoDB transactions, and the
/// collection indexes carry the uniqueness invariants.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    async fn find_all<T>(&self, filter: Document, options: Option<FindOptions>) -> Result<Vec<T>>
    where
        T: MongoCollection + DeserializeOwned + Unpin + Send + Sync,
    {
        let found = self
            .coll::<T>()
            .find(filter, options)
            .await?
            .try_collect::<Vec<_>>()
            .await?;
        Ok(found)
    }

    async fn insert_votes_once(&self, votes: &[Vote]) -> std::result::Result<(), DbError> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;
        self.coll::<Vote>()
            .insert_many_with_session(votes, None, &mut session)
            .await?;
        // Dropping the session on error aborts the transaction.
        session.commit_transaction().await
    }

    async fn activate_once(
        &self,
        election_id: Id,
        now: BsonDateTime,
    ) -> std::result::Result<Option<Election>, DbError> {
        let elections = self.coll::<Election>();
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Release the slot held by any election whose window has passed.
        let stale = doc! {
            "_id": { "$ne": election_id },
            "active": true,
            "end_time": { "$lte": now },
        };
        let cleared = elections
            .update_many_with_session(stale, doc! { "$set": { "active": false } }, None, &mut session)
            .await?;
        if cleared.modified_count > 0 {
            info!("Cleared stale active flag on {} election(s)", cleared.modified_count);
        }

        let filter = doc! {
            "_id": election_id,
            "activated_at": null,
            "closed_at": null,
            "end_time": { "$gt": now },
        };
        let update = doc! { "$set": { "active": true, "activated_at": now } };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let activated = elections
            .find_one_and_update_with_session(filter, update, options, &mut session)
            .await?;
        if activated.is_some() {
            session.commit_transaction().await?;
        }
        Ok(activated)
    }
}

#[rocket::async_trait]
impl BallotStore for MongoStore {
    async fn election(&self, election_id: Id) -> Result<Option<Election>> {
        Ok(self
            .coll::<Election>()
            .find_one(election_id.as_doc(), None)
            .await?)
    }

    async fn office_categories(&self) -> Result<Vec<OfficeCategory>> {
        let options = FindOptions::builder().sort(doc! { "display_order": 1 }).build();
        self.find_all(doc! {}, Some(options)).await
    }

    async fn offices(&self, election_id: Id) -> Result<Vec<Office>> {
        let options = FindOptions::builder()
            .sort(doc! { "display_order": 1, "_id": 1 })
            .build();
        self.find_all(doc! { "election_id": election_id }, Some(options))
            .await
    }

    async fn candidacies(&self, election_id: Id) -> Result<Vec<Candidacy>> {
        self.find_all(doc! { "election_id": election_id }, None).await
    }

    async fn member(&self, member_id: Id) -> Result<Option<Member>> {
        Ok(self
            .coll::<Member>()
            .find_one(member_id.as_doc(), None)
            .await?)
    }

    async fn members(&self, member_ids: &[Id]) -> Result<Vec<Member>> {
        let ids = member_ids.iter().copied().map(Bson::from).collect::<Vec<_>>();
        self.find_all(doc! { "_id": { "$in": ids } }, None).await
    }

    async fn active_members(&self) -> Result<Vec<Member>> {
        self.find_all(doc! { "active": true }, None).await
    }

    async fn insert_votes(&self, votes: Vec<Vote>) -> Result<()> {
        let Some(election_id) = votes.first().map(|vote| vote.election_id) else {
            return Ok(());
        };
        match retry_transient("vote insertion", || self.insert_votes_once(&votes)).await {
            Ok(()) => Ok(()),
            Err(err) if is_duplicate_key_error(&err) => Err(ConflictError::AlreadyVoted {
                election_id: election_id.into(),
                offices: Vec::new(),
            }
            .into()),
            Err(err) => Err(err.into()),
        }
    }

    async fn vote(&self, vote_id: Id) -> Result<Option<Vote>> {
        Ok(self.coll::<Vote>().find_one(vote_id.as_doc(), None).await?)
    }

    async fn votes(&self, election_id: Id, office_id: Option<Id>) -> Result<Vec<Vote>> {
        let mut filter = doc! { "election_id": election_id };
        if let Some(office_id) = office_id {
            filter.insert("office_id", office_id);
        }
        let options = FindOptions::builder()
            .sort(doc! { "office_id": 1, "cast_at": 1 })
            .build();
        self.find_all(filter, Some(options)).await
    }

    async fn voted_offices(&self, election_id: Id, member_id: Id) -> Result<HashSet<Id>> {
        let filter = doc! { "election_id": election_id, "member_id": member_id };
        let offices = self
            .coll::<Vote>()
            .distinct("office_id", filter, None)
            .await?;
        Ok(offices
            .into_iter()
            .filter_map(|id| id.as_object_id().map(Id::from))
            .collect())
    }

    async fn invalidations(&self, election_id: Id) -> Result<Vec<VoteInvalidation>> {
        self.find_all(doc! { "election_id": election_id }, None).await
    }

    async fn insert_invalidation(&self, invalidation: VoteInvalidation) -> Result<()> {
        match self
            .coll::<VoteInvalidation>()
            .insert_one(&invalidation, None)
            .await
        {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key_error(&err) => Err(ConflictError::AlreadyInvalidated {
                vote_id: invalidation.vote_id.into(),
            }
            .into()),
            Err(err) => Err(err.into()),
        }
    }

    async fn activate_election(&self, election_id: Id, now: DateTime<Utc>) -> Result<Election> {
        let now_bson = BsonDateTime::from_chrono(now);
        let activated =
            match retry_transient("election activation", || {
                self.activate_once(election_id, now_bson)
            })
            .await
            {
                Ok(activated) => activated,
                Err(err) if is_duplicate_key_error(&err) => {
                    return Err(ConflictError::AnotherElectionOpen.into())
                }
                Err(err) => return Err(err.into()),
            };
        match activated {
            Some(election) => Ok(election),
            // Lost a race with another activation or a close.
            None => {
                let election = self
                    .election(election_id)
                    .await?
                    .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))?;
                Err(StateError::CannotActivate {
                    election_id: election_id.into(),
                    status: election.status_at(now),
                }
                .into())
            }
        }
    }

    async fn close_election(&self, election_id: Id, now: DateTime<Utc>) -> Result<Election> {
        let filter = doc! { "_id": election_id, "closed_at": null };
        let update = doc! {
            "$set": { "active": false, "closed_at": BsonDateTime::from_chrono(now) }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        match self
            .coll::<Election>()
            .find_one_and_update(filter, update, options)
            .await?
        {
            Some(election) => Ok(election),
            None => match self.election(election_id).await? {
                Some(_) => Err(StateError::AlreadyClosed {
                    election_id: election_id.into(),
                }
                .into()),
                None => Err(Error::not_found(format!("Election with ID '{election_id}'"))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::panic::AssertUnwindSafe;
    use std::sync::Arc;

    use rand::{distributions::Alphanumeric, Rng};
    use rocket::futures::{future::join_all, FutureExt};

    use super::*;
    use crate::engine::record::{IntegrityKey, VoteBuilder};
    use crate::model::{
        common::outcome::VoteOutcome, db::vote::OriginMetadata, mongodb::ensure_indexes_exist,
    };

    /// Run `test` against a fresh database, which is dropped afterwards whether or not the test passes.
    /// Transactions need a replica set; point `ROCKET_DB_URI` at one.
    async fn with_test_store<F, Fut>(test: F)
    where
        F: FnOnce(Arc<MongoStore>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let uri = std::env::var("ROCKET_DB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017/?replicaSet=rs0".to_string());
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(8)
            .map(char::from)
            .collect();
        let client = Client::with_uri_str(&uri).await.unwrap();
        let db = client.database(&format!("ballotbox_test_{suffix}"));
        ensure_indexes_exist(&db).await.unwrap();

        let store = Arc::new(MongoStore::new(client, db.clone()));
        let result = AssertUnwindSafe(test(store)).catch_unwind().await;

        db.drop(None).await.unwrap();
        if let Err(cause) = result {
            std::panic::resume_unwind(cause);
        }
    }

    #[test]
    fn retry_delay_grows_then_caps() {
        assert_eq!(retry_delay(0), FIRST_RETRY_DELAY);
        assert_eq!(retry_delay(1), FIRST_RETRY_DELAY * 2);
        assert!(retry_delay(4) > retry_delay(3));
        assert_eq!(retry_delay(20), MAX_RETRY_DELAY);
        assert_eq!(retry_delay(u32::MAX), MAX_RETRY_DELAY);
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn concurrent_ballots_commit_once() {
        with_test_store(|store| async move {
            let key = IntegrityKey::new("mongo-test-secret");
            let (election, member) = (Id::new(), Id::new());
            let offices = [Id::new(), Id::new()];

            let submissions = (0..8).map(|_| {
                let builder =
                    VoteBuilder::new(&key, election, member, Utc::now(), OriginMetadata::default());
                let votes = offices
                    .iter()
                    .map(|office| builder.build(*office, VoteOutcome::Blank))
                    .collect::<Vec<_>>();
                let store = store.clone();
                rocket::tokio::spawn(async move { store.insert_votes(votes).await })
            });
            let results = join_all(submissions.collect::<Vec<_>>()).await;

            let mut committed = 0;
            for result in results {
                match result.unwrap() {
                    Ok(()) => committed += 1,
                    Err(err) => assert!(
                        matches!(err, Error::Conflict(ConflictError::AlreadyVoted { .. })),
                        "unexpected error {err:?}"
                    ),
                }
            }
            assert_eq!(committed, 1);
            assert_eq!(store.votes(election, None).await.unwrap().len(), 2);
        })
        .await;
    }

    #[rocket::async_test]
    #[ignore = "needs a MongoDB replica set"]
    async fn conflicting_ballot_leaves_no_rows() {
        with_test_store(|store| async move {
            let key = IntegrityKey::new("mongo-test-secret");
            let (election, member) = (Id::new(), Id::new());
            let (first, second) = (Id::new(), Id::new());

            let builder =
                VoteBuilder::new(&key, election, member, Utc::now(), OriginMetadata::default());
            store
                .insert_votes(vec![builder.build(first, VoteOutcome::Blank)])
                .await
                .unwrap();

            // The second office is new, but the first is already taken.
            let votes = vec![
                builder.build(second, VoteOutcome::Null),
                builder.build(first, VoteOutcome::Null),
            ];
            let err = store.insert_votes(votes).await.unwrap_err();
            assert!(matches!(
                err,
                Error::Conflict(ConflictError::AlreadyVoted { .. })
            ));
            assert!(store.votes(election, Some(second)).await.unwrap().is_empty());
            assert_eq!(
                store.voted_offices(election, member).await.unwrap(),
                HashSet::from([first])
            );
        })
        .await;
    }
}
