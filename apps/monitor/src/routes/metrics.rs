use actix_web::{HttpResponse, get, web};
use tracing::error;

use crate::metrics::render;

#[get("/metrics")]
pub async fn metrics_route(registry: web::Data<prometheus::Registry>) -> HttpResponse {
    match render(&registry) {
        Ok((content_type, body)) => HttpResponse::Ok().content_type(content_type).body(body),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            HttpResponse::InternalServerError().finish()
        }
    }
}
