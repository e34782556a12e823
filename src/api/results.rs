use chrono::Utc;
use rocket::{serde::json::Json, Route, State};

use crate::engine;
use crate::error::Result;
use crate::model::{
    api::{
        audit::AuditRecord, auth::Admin, auth::AuthToken, election::ElectionDescription,
        tally::ElectionTally,
    },
    mongodb::Id,
};
use crate::store::Store;

pub fn routes() -> Vec<Route> {
    routes![election, audit_admin, audit_public, tally_admin, tally_public]
}

#[get("/elections/<election_id>")]
async fn election(election_id: Id, store: &State<Store>) -> Result<Json<ElectionDescription>> {
    let description =
        engine::describe_election(store.inner().as_ref(), election_id, Utc::now()).await?;
    Ok(Json(description))
}

#[get("/elections/<election_id>/audit", rank = 1)]
async fn audit_admin(
    _token: AuthToken<Admin>,
    election_id: Id,
    store: &State<Store>,
) -> Result<Json<Vec<AuditRecord>>> {
    let records = engine::audit_trail(store.inner().as_ref(), election_id).await?;
    Ok(Json(records))
}

#[get("/elections/<election_id>/audit", rank = 2)]
async fn audit_public(election_id: Id, store: &State<Store>) -> Result<Json<Vec<AuditRecord>>> {
    let records =
        engine::published_audit_trail(store.inner().as_ref(), election_id, Utc::now()).await?;
    Ok(Json(records))
}

#[get("/elections/<election_id>/tally?<office>", rank = 1)]
async fn tally_admin(
    _token: AuthToken<Admin>,
    election_id: Id,
    office: Option<Id>,
    store: &State<Store>,
) -> Result<Json<ElectionTally>> {
    let tally = engine::get_tally(store.inner().as_ref(), election_id, office, Utc::now()).await?;
    Ok(Json(tally))
}

#[get("/elections/<election_id>/tally?<office>", rank = 2)]
async fn tally_public(
    election_id: Id,
    office: Option<Id>,
    store: &State<Store>,
) -> Result<Json<ElectionTally>> {
    let tally =
        engine::get_published_tally(store.inner().as_ref(), election_id, office, Utc::now())
            .await?;
    Ok(Json(tally))
}
