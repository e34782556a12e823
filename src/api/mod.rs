use rocket::Route;

mod admin;
mod ballot;
mod results;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(ballot::routes());
    routes.extend(results::routes());
    routes
}
