use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::engine::{self, IntegrityKey};
use crate::error::Result;
use crate::logging::RequestId;
use crate::model::{
    api::{
        auth::AuthToken,
        ballot::{BallotEntry, VoteReceipt},
        election::VotingStatus,
    },
    db::{member::Member, vote::OriginMetadata},
    mongodb::Id,
};
use crate::store::Store;

pub fn routes() -> Vec<Route> {
    routes![cast_ballot, voting_status, office_voting_status]
}

#[post("/elections/<election_id>/ballot", data = "<entries>", format = "json")]
#[allow(clippy::too_many_arguments)]
async fn cast_ballot(
    token: AuthToken<Member>,
    election_id: Id,
    entries: Json<Vec<BallotEntry>>,
    origin: OriginMetadata,
    request_id: &RequestId,
    store: &State<Store>,
    key: &State<IntegrityKey>,
) -> Result<Json<Vec<VoteReceipt>>> {
    debug!("req{request_id} ballot with {} entries", entries.len());
    let receipts = engine::cast_ballot(
        store.inner().as_ref(),
        key,
        token.id,
        election_id,
        &entries,
        origin,
        Utc::now(),
    )
    .await?;
    Ok(Json(receipts))
}

#[get("/elections/<election_id>/voted")]
async fn voting_status(
    token: AuthToken<Member>,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<VotingStatus>> {
    let mut offices = engine::voted_offices(store.inner().as_ref(), election_id, token.id)
        .await?
        .into_iter()
        .collect::<Vec<_>>();
    offices.sort();
    Ok(Json(VotingStatus {
        election_id: election_id.into(),
        voted: !offices.is_empty(),
        offices: offices.into_iter().map(Into::into).collect(),
    }))
}

#[get("/elections/<election_id>/offices/<office_id>/voted")]
async fn office_voting_status(
    token: AuthToken<Member>,
    election_id: Id,
    office_id: Id,
    store: &State<Store>,
) -> Result<Json<VotingStatus>> {
    let voted =
        engine::has_voted_for_office(store.inner().as_ref(), election_id, office_id, token.id)
            .await?;
    let offices = if voted { vec![office_id.into()] } else { vec![] };
    Ok(Json(VotingStatus {
        election_id: election_id.into(),
        voted,
        offices,
    }))
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
    use crate::error::ErrorBody;
    use crate::store::BallotStore;

    #[backend_test]
    async fn cast_and_check_status(client: Client, scenario: Scenario) {
        let election_id = scenario.election.id;
        let cookie = member_cookie(&client, &scenario.voter);

        // Nothing recorded yet.
        let status = get_status(&client, &scenario).await;
        assert!(!status.voted);

        // Cast a full ballot.
        let response = client
            .post(uri!(cast_ballot(election_id)))
            .header(ContentType::JSON)
            .cookie(cookie.clone())
            .body(serde_json::to_string(&scenario.full_ballot()).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let receipts: Vec<VoteReceipt> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(receipts.len(), 2);

        // Both offices are now recorded.
        let status = get_status(&client, &scenario).await;
        assert!(status.voted);
        assert_eq!(status.offices.len(), 2);

        let response = client
            .get(uri!(office_voting_status(election_id, scenario.president.id)))
            .cookie(cookie)
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let status: VotingStatus =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert!(status.voted);
        assert_eq!(status.offices, vec![scenario.president.id.into()]);
    }

    #[backend_test]
    async fn second_ballot_conflicts(client: Client, scenario: Scenario) {
        let body = serde_json::to_string(&scenario.full_ballot()).unwrap();
        for expected in [Status::Ok, Status::Conflict] {
            let response = client
                .post(uri!(cast_ballot(scenario.election.id)))
                .header(ContentType::JSON)
                .cookie(member_cookie(&client, &scenario.voter))
                .body(body.clone())
                .dispatch()
                .await;
            assert_eq!(expected, response.status());
            if expected == Status::Conflict {
                let error: ErrorBody =
                    serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
                assert_eq!(error.error, "conflict");
            }
        }
    }

    #[backend_test]
    async fn ineligible_ballot_is_forbidden(client: Client, scenario: Scenario) {
        // The Delegate candidacy cannot be chosen for President.
        let entries = vec![
            BallotEntry::candidate(scenario.president.id, scenario.candidacies[2].id),
            BallotEntry::blank(scenario.delegate.id),
        ];
        let response = client
            .post(uri!(cast_ballot(scenario.election.id)))
            .header(ContentType::JSON)
            .cookie(member_cookie(&client, &scenario.voter))
            .body(serde_json::to_string(&entries).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::Forbidden, response.status());
        let error: ErrorBody = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(error.error, "eligibility");
        assert!(error.details.is_some());

        // Nothing was recorded.
        let voted = scenario
            .store
            .voted_offices(scenario.election.id, scenario.voter.id)
            .await
            .unwrap();
        assert!(voted.is_empty());
    }

    #[backend_test]
    async fn malformed_ballot_is_unprocessable(client: Client, scenario: Scenario) {
        let mut entries = scenario.full_ballot();
        entries.push(BallotEntry::blank(scenario.delegate.id));
        let response = client
            .post(uri!(cast_ballot(scenario.election.id)))
            .header(ContentType::JSON)
            .cookie(member_cookie(&client, &scenario.voter))
            .body(serde_json::to_string(&entries).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::UnprocessableEntity, response.status());
        let error: ErrorBody = serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(error.error, "validation");
    }

    #[backend_test]
    async fn ballot_requires_member_token(client: Client, scenario: Scenario) {
        let body = serde_json::to_string(&scenario.full_ballot()).unwrap();

        // No token at all.
        let response = client
            .post(uri!(cast_ballot(scenario.election.id)))
            .header(ContentType::JSON)
            .body(body.clone())
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        // An admin token is not a member token.
        let response = client
            .post(uri!(cast_ballot(scenario.election.id)))
            .header(ContentType::JSON)
            .cookie(admin_cookie(&client))
            .body(body)
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    async fn get_status(client: &Client, scenario: &Scenario) -> VotingStatus {
        let response = client
            .get(uri!(voting_status(scenario.election.id)))
            .cookie(member_cookie(client, &scenario.voter))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }
}
