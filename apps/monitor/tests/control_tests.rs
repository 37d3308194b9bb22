//! Tests for the control endpoint and its token check

use std::sync::Arc;
use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::{App, test, web};
use uptime_monitor::ProberRegistry;
use uptime_monitor::auth::AuthToken;
use uptime_monitor::measurement::{Measurement, Observer};
use uptime_monitor::prober::ProbeClient;
use uptime_monitor::routes;

const TOKEN: &str = "0123456789abcdef";

struct Discard;

impl Observer for Discard {
    fn observe(&self, _measurement: &Measurement) {}
}

fn probers() -> web::Data<ProberRegistry> {
    let client = ProbeClient::new(Duration::from_secs(1)).unwrap();
    web::Data::new(ProberRegistry::new(client, Arc::new(Discard)))
}

macro_rules! control_app {
    ($probers:expr) => {
        test::init_service(
            App::new()
                .app_data($probers.clone())
                .app_data(web::Data::new(AuthToken::new(TOKEN)))
                .configure(routes::routes),
        )
        .await
    };
}

fn bearer() -> (&'static str, String) {
    ("Authorization", format!("Bearer {TOKEN}"))
}

#[actix_web::test]
async fn test_post_registers_and_delete_unregisters() {
    let probers = probers();
    let app = control_app!(probers);

    let req = test::TestRequest::post()
        .uri("/target?target=http%3A%2F%2F127.0.0.1%3A1&codes=200,204&interval=1h0m0s")
        .insert_header(bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let request = probers.request("http://127.0.0.1:1").expect("target registered");
    assert_eq!(request.method, "GET");
    assert!(request.is_valid_code(204));
    assert_eq!(request.interval, Duration::from_secs(3600));

    let req = test::TestRequest::delete()
        .uri("/target?target=http%3A%2F%2F127.0.0.1%3A1")
        .insert_header(bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(probers.is_empty());
}

#[actix_web::test]
async fn test_delete_of_unknown_target_is_ok() {
    let probers = probers();
    let app = control_app!(probers);

    let req = test::TestRequest::delete()
        .uri("/target?target=unknown.example.com")
        .insert_header(bearer())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn test_repeated_post_keeps_single_prober() {
    let probers = probers();
    let app = control_app!(probers);

    for _ in 0..3 {
        let req = test::TestRequest::post()
            .uri("/target?target=http%3A%2F%2F127.0.0.1%3A1&interval=1h")
            .insert_header(bearer())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }
    assert_eq!(probers.targets(), vec!["http://127.0.0.1:1".to_string()]);
}

#[actix_web::test]
async fn test_invalid_request_is_bad_request() {
    let probers = probers();
    let app = control_app!(probers);

    for uri in ["/target", "/target?method=GET", "/target?target=a&codes=abc", "/target?target=a&interval=5x"] {
        let req = test::TestRequest::post().uri(uri).insert_header(bearer()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");

        let body = test::read_body(resp).await;
        assert!(body.starts_with(b"invalid request: "), "{uri}");
    }
    assert!(probers.is_empty());
}

#[actix_web::test]
async fn test_other_methods_are_rejected_before_decoding() {
    let probers = probers();
    let app = control_app!(probers);

    for req in [
        test::TestRequest::get().uri("/target?target=example.com"),
        test::TestRequest::put().uri("/target?target=example.com"),
        test::TestRequest::get().uri("/target"),
    ] {
        let resp = test::call_service(&app, req.insert_header(bearer()).to_request()).await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
    assert!(probers.is_empty());
}

#[actix_web::test]
async fn test_missing_or_wrong_token_is_unauthorized() {
    let probers = probers();
    let app = control_app!(probers);

    let requests = [
        test::TestRequest::post().uri("/target?target=example.com"),
        test::TestRequest::post()
            .uri("/target?target=example.com")
            .insert_header(("Authorization", "Bearer nope")),
        test::TestRequest::post()
            .uri("/target?target=example.com")
            .insert_header(("Authorization", TOKEN)),
    ];
    for req in requests {
        let resp = test::call_service(&app, req.to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(test::read_body(resp).await, "Unauthorized");
    }
    assert!(probers.is_empty());
}

#[actix_web::test]
async fn test_health_needs_no_token() {
    let probers = probers();
    let app = control_app!(probers);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(test::read_body(resp).await.is_empty());
}
