use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::engine::{self, IntegrityKey};
use crate::error::Result;
use crate::model::{
    api::{
        audit::{IntegrityReport, InvalidationReceipt, InvalidationRequest, VoteRecord},
        auth::{Admin, AuthToken},
        election::ElectionSummary,
    },
    mongodb::Id,
};
use crate::store::Store;

pub fn routes() -> Vec<Route> {
    routes![
        activate_election,
        close_election,
        election_votes,
        election_integrity,
        invalidate_vote,
    ]
}

#[post("/admin/elections/<election_id>/activate")]
async fn activate_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<ElectionSummary>> {
    let now = Utc::now();
    let election = engine::activate_election(store.inner().as_ref(), election_id, now).await?;
    Ok(Json(ElectionSummary::new(&election, now)))
}

#[post("/admin/elections/<election_id>/close")]
async fn close_election(
    _token: AuthToken<Admin>,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<ElectionSummary>> {
    let now = Utc::now();
    let election = engine::close_election(store.inner().as_ref(), election_id, now).await?;
    Ok(Json(ElectionSummary::new(&election, now)))
}

#[get("/admin/elections/<election_id>/votes")]
async fn election_votes(
    _token: AuthToken<Admin>,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<Vec<VoteRecord>>> {
    let records = engine::vote_records(store.inner().as_ref(), election_id).await?;
    Ok(Json(records))
}

#[get("/admin/elections/<election_id>/integrity")]
async fn election_integrity(
    _token: AuthToken<Admin>,
    election_id: Id,
    store: &State<Store>,
    key: &State<IntegrityKey>,
) -> Result<Json<IntegrityReport>> {
    let report = engine::verify_integrity(store.inner().as_ref(), key, election_id).await?;
    Ok(Json(report))
}

#[post("/admin/votes/<vote_id>/invalidate", data = "<request>", format = "json")]
async fn invalidate_vote(
    token: AuthToken<Admin>,
    vote_id: Id,
    request: Json<InvalidationRequest>,
    store: &State<Store>,
) -> Result<Json<InvalidationReceipt>> {
    let invalidation = engine::invalidate_vote(
        store.inner().as_ref(),
        token.id,
        vote_id,
        request.into_inner().reason,
        Utc::now(),
    )
    .await?;
    Ok(Json((&invalidation).into()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json,
    };

    use super::*;
    use crate::engine::testing::{admin_cookie, member_cookie, Scenario};
    use crate::model::{
        api::{ballot::VoteReceipt, id::ApiId},
        common::election::ElectionStatus,
        db::election::Election,
    };

    #[backend_test]
    async fn close_then_activate_next(client: Client, scenario: Scenario) {
        let next = Election::scheduled_example();
        scenario.store.insert_election(next.clone()).await;

        // The open election still holds the slot.
        let response = client
            .post(uri!(activate_election(next.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());

        // Close it.
        let response = client
            .post(uri!(close_election(scenario.election.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let summary: ElectionSummary =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(summary.status, ElectionStatus::Closed);
        assert!(summary.closed_at.is_some());

        // Now the next one can be activated.
        let response = client
            .post(uri!(activate_election(next.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let summary: ElectionSummary =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(summary.active);
        assert_eq!(summary.status, ElectionStatus::Scheduled);
    }

    #[backend_test]
    async fn votes_and_integrity(client: Client, scenario: Scenario) {
        // Cast through the server so the votes are sealed with its key.
        let response = client
            .post(format!("/elections/{}/ballot", scenario.election.id))
            .header(ContentType::JSON)
            .cookie(member_cookie(&client, &scenario.voter))
            .body(serde_json::to_string(&scenario.full_ballot()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let response = client
            .get(uri!(election_votes(scenario.election.id)))
            .cookie(admin_cookie(&client))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let records: Vec<VoteRecord> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|r| r.member_id == ApiId::from(scenario.voter.id)));

        let report = get_integrity(&client, &scenario).await;
        assert_eq!(report.checked, 2);
        assert!(report.is_intact());

        // Tamper with one stored vote.
        let mut tampered = records[0].to_vote();
        tampered.vote.cast_at = tampered.cast_at + chrono::Duration::seconds(1);
        scenario.store.overwrite_vote(tampered.clone()).await;

        let report = get_integrity(&client, &scenario).await;
        assert_eq!(report.tampered, vec![ApiId::from(tampered.id)]);
    }

    #[backend_test]
    async fn invalidate_once(client: Client, scenario: Scenario) {
        let receipts: Vec<VoteReceipt> = scenario
            .cast(&scenario.voter, &scenario.full_ballot())
            .await
            .unwrap();
        let vote_id: Id = receipts[0].vote_id.into();

        // A reason is required.
        let status = invalidate(&client, vote_id, "  ").await;
        assert_eq!(Status::BadRequest, status);

        assert_eq!(Status::Ok, invalidate(&client, vote_id, "Duplicate identity").await);
        assert_eq!(Status::Conflict, invalidate(&client, vote_id, "Again").await);
        assert_eq!(Status::NotFound, invalidate(&client, Id::new(), "Unknown").await);
    }

    #[backend_test]
    async fn member_cannot_administer(client: Client, scenario: Scenario) {
        let response = client
            .post(uri!(close_election(scenario.election.id)))
            .cookie(member_cookie(&client, &scenario.voter))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
        let response = client
            .get(uri!(election_votes(scenario.election.id)))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    async fn get_integrity(client: &Client, scenario: &Scenario) -> IntegrityReport {
        let response = client
            .get(uri!(election_integrity(scenario.election.id)))
            .cookie(admin_cookie(client))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }

    async fn invalidate(client: &Client, vote_id: Id, reason: &str) -> Status {
        let request = InvalidationRequest {
            reason: reason.to_string(),
        };
        client
            .post(uri!(invalidate_vote(vote_id)))
            .header(ContentType::JSON)
            .cookie(admin_cookie(client))
            .body(serde_json::to_string(&request).unwrap())
            .dispatch()
            .await
            .status()
    }
}
