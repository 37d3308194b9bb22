use actix_web::middleware::from_fn;
use actix_web::web;
use uptime_wire::TARGET_PATH;

use crate::auth::bearer_auth;

mod health;
mod metrics;
mod target;

pub use health::health_route;
pub use metrics::metrics_route;
pub use target::target_route;

/// Routes of the control server. Only the control endpoint requires the token.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_route).service(
        web::resource(TARGET_PATH)
            .wrap(from_fn(bearer_auth))
            .to(target_route),
    );
}

/// Routes of the metrics server
pub fn metrics_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(metrics_route);
}
