use actix_web::{HttpResponse, Responder, get};

/// Liveness probe, always answers 200 with an empty body
#[get("/health")]
pub async fn health_route() -> impl Responder {
    HttpResponse::Ok()
}
