//! Bearer token check for the control endpoint.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::AUTHORIZATION;
use actix_web::middleware::Next;
use actix_web::{Error, HttpResponse, web};
use tracing::warn;

/// Shared secret the agent must present as `Authorization: Bearer <token>`
#[derive(Clone)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    fn accepts(&self, header: &[u8]) -> bool {
        header
            .strip_prefix(b"Bearer ")
            .is_some_and(|presented| presented == self.0.as_bytes())
    }
}

/// Reject requests that carry no `Authorization` header matching the token.
///
/// Use with [`actix_web::middleware::from_fn`]; the token is read from
/// `web::Data<AuthToken>` app data and requests are refused when it is absent.
pub async fn bearer_auth<B: MessageBody>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let authorized = req.app_data::<web::Data<AuthToken>>().is_some_and(|token| {
        req.headers()
            .get_all(AUTHORIZATION)
            .any(|value| token.accepts(value.as_bytes()))
    });

    if !authorized {
        warn!(path = req.path(), peer = ?req.peer_addr(), "unauthorized request");
        let response = HttpResponse::Unauthorized().body("Unauthorized").map_into_right_body();
        return Ok(req.into_response(response));
    }

    Ok(next.call(req).await?.map_into_left_body())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_only_exact_bearer_token() {
        let token = AuthToken::new("secret");
        assert!(token.accepts(b"Bearer secret"));
        assert!(!token.accepts(b"Bearer secret2"));
        assert!(!token.accepts(b"bearer secret"));
        assert!(!token.accepts(b"secret"));
        assert!(!token.accepts(b"Basic secret"));
        assert!(!token.accepts(b""));
    }
}
