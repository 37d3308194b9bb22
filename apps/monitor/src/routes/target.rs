use actix_web::http::Method;
use actix_web::http::header::{self, ContentType};
use actix_web::{HttpRequest, HttpResponse, web};
use tracing::warn;
use uptime_wire::ProbeRequest;

use crate::registry::ProberRegistry;

/// Control endpoint: `POST` registers a check and `DELETE` unregisters it.
///
/// Removing a target that is not registered still answers 200.
pub async fn target_route(req: HttpRequest, registry: web::Data<ProberRegistry>) -> HttpResponse {
    let add = match req.method() {
        &Method::POST => true,
        &Method::DELETE => false,
        other => {
            warn!(method = %other, "invalid method on control endpoint");
            return HttpResponse::MethodNotAllowed()
                .insert_header((header::ALLOW, "POST, DELETE"))
                .content_type(ContentType::plaintext())
                .body(format!("invalid method: {other}"));
        }
    };

    let request = match ProbeRequest::decode(req.query_string()) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, query = req.query_string(), "invalid probe request");
            return HttpResponse::BadRequest()
                .content_type(ContentType::plaintext())
                .body(format!("invalid request: {err}"));
        }
    };

    if add {
        registry.add(request);
    } else {
        registry.remove(&request.target);
    }

    HttpResponse::Ok().finish()
}
