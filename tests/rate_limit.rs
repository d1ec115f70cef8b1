mod common;

use std::net::SocketAddr;

use actix_web::{http::header, test, App};
use buyeragent_server::configure_routes;
use serde_json::{json, Value};

use common::{register_body, test_settings, test_state};

fn client(ip: &str) -> SocketAddr {
    format!("{}:40000", ip).parse().unwrap()
}

fn bad_login() -> Value {
    json!({"email": "a@b.com", "password": "wrong-password"})
}

#[actix_web::test]
async fn test_sixth_failed_login_is_throttled() {
    let state = test_state(test_settings());
    let app = test::init_service(App::new().configure(configure_routes(&state))).await;

    for attempt in 1..=5u32 {
        let resp = test::TestRequest::post()
            .uri("/api/auth/login")
            .peer_addr(client("203.0.113.10"))
            .set_json(bad_login())
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 401, "attempt {}", attempt);
        assert_eq!(resp.headers().get("ratelimit-limit").unwrap(), "5");
        assert_eq!(
            resp.headers().get("ratelimit-remaining").unwrap(),
            (5 - attempt).to_string().as_str()
        );
    }

    let resp = test::TestRequest::post()
        .uri("/api/auth/login")
        .peer_addr(client("203.0.113.10"))
        .set_json(bad_login())
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);
    assert_eq!(resp.headers().get("ratelimit-remaining").unwrap(), "0");
    assert!(resp.headers().contains_key(header::RETRY_AFTER));
    assert!(resp.headers().get("x-ratelimit-limit").is_none());
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
    assert_eq!(
        body["error"]["message"],
        "Too many login attempts, please try again later."
    );

    // A different client still gets through.
    let resp = test::TestRequest::post()
        .uri("/api/auth/login")
        .peer_addr(client("203.0.113.11"))
        .set_json(bad_login())
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_successful_logins_are_not_counted() {
    let state = test_state(test_settings());
    let app = test::init_service(App::new().configure(configure_routes(&state))).await;

    test::TestRequest::post()
        .uri("/api/auth/register")
        .peer_addr(client("198.51.100.20"))
        .set_json(register_body("a@b.com"))
        .send_request(&app)
        .await;

    for _ in 0..8 {
        let resp = test::TestRequest::post()
            .uri("/api/auth/login")
            .peer_addr(client("198.51.100.20"))
            .set_json(json!({"email": "a@b.com", "password": "password1"}))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers().get("ratelimit-remaining").unwrap(), "5");
    }

    assert_eq!(state.login_limiter.remaining("198.51.100.20").await, 5);
}

#[actix_web::test]
async fn test_general_api_limit() {
    let mut settings = test_settings();
    settings.rate_limit.api_max_requests = 3;
    let state = test_state(settings);
    let app = test::init_service(App::new().configure(configure_routes(&state))).await;

    for _ in 0..3 {
        let resp = test::TestRequest::post()
            .uri("/api/auth/refresh")
            .peer_addr(client("192.0.2.5"))
            .set_json(json!({"refreshToken": "nope"}))
            .send_request(&app)
            .await;
        assert_eq!(resp.status(), 401);
    }

    let resp = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .peer_addr(client("192.0.2.5"))
        .set_json(json!({"refreshToken": "nope"}))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 429);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body["error"]["message"],
        "Too many requests from this IP, please try again later."
    );

    // Health is outside the API scope.
    let resp = test::TestRequest::get()
        .uri("/health")
        .peer_addr(client("192.0.2.5"))
        .send_request(&app)
        .await;
    assert_eq!(resp.status(), 200);
}
