use rocket::Route;

mod ping;
mod questions;
mod responses;

/// Where every route is mounted.
pub const BASE: &str = "/v1/survey";

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(ping::routes());
    routes.extend(questions::routes());
    routes.extend(responses::routes());
    routes
}
