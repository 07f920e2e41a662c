use rocket::Route;

pub fn routes() -> Vec<Route> {
    routes![ping]
}

/// Liveness check.
#[get("/ping")]
async fn ping() -> &'static str {
    "pong"
}
