//! Route definitions

pub mod billing;
pub mod health;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::auth::session_middleware;
use crate::state::AppState;

/// Build the application router.
///
/// The catalog and health endpoints are public; everything else requires
/// the gateway identity headers.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/subscription",
            get(billing::get_subscription)
                .post(billing::create_subscription)
                .patch(billing::update_subscription),
        )
        .route("/subscription/cancel", post(billing::cancel_subscription))
        .route(
            "/subscription/reactivate",
            post(billing::reactivate_subscription),
        )
        .route("/history", get(billing::billing_history))
        .route(
            "/payment-method",
            get(billing::get_payment_method).put(billing::update_payment_method),
        )
        .route("/simulate-payment", post(billing::simulate_payment))
        .route("/invariants", get(billing::run_invariants))
        .layer(middleware::from_fn(session_middleware));

    let billing_routes = Router::new()
        .route("/plans", get(billing::list_plans))
        .merge(protected);

    Router::new()
        .route("/api/health", get(health::health_check))
        .nest("/api/billing", billing_routes)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::config::Config;

    fn app() -> Router {
        let config = Config {
            bind_address: "127.0.0.1:0".to_string(),
            allowed_origins: vec![],
        };
        create_router(AppState::new(config))
    }

    fn request(
        method: Method,
        uri: &str,
        identity: Option<(&str, &str, &str)>,
        body: Option<Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user, org, role)) = identity {
            builder = builder
                .header("x-user-id", user)
                .header("x-org-id", org)
                .header("x-role", role);
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let response = app()
            .oneshot(request(Method::GET, "/api/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_plans_are_public_and_ordered() {
        let response = app()
            .oneshot(request(Method::GET, "/api/billing/plans", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        let plans = body["plans"].as_array().unwrap();
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0]["id"], "starter");
        assert_eq!(plans[2]["id"], "enterprise");
    }

    #[tokio::test]
    async fn test_subscription_requires_identity() {
        let response = app()
            .oneshot(request(Method::GET, "/api/billing/subscription", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn test_subscribe_and_read_back() {
        let app = app();
        let user = Uuid::new_v4().to_string();
        let org = Uuid::new_v4().to_string();
        let identity = (user.as_str(), org.as_str(), "owner");

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/billing/subscription",
                Some(identity),
                Some(json!({"plan_id": "professional", "billing_interval": "monthly"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["status"], "active");
        assert_eq!(created["amount"], 7900);

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/billing/subscription",
                Some(identity),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let view = json_body(response).await;
        assert_eq!(view["entitlement"]["plan"], "professional");
        assert!(view["entitlement"]["features"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f == "customer-portal"));
    }

    #[tokio::test]
    async fn test_member_cannot_subscribe() {
        let user = Uuid::new_v4().to_string();
        let org = Uuid::new_v4().to_string();
        let response = app()
            .oneshot(request(
                Method::POST,
                "/api/billing/subscription",
                Some((user.as_str(), org.as_str(), "member")),
                Some(json!({"plan_id": "starter"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_unknown_plan_rejected() {
        let user = Uuid::new_v4().to_string();
        let org = Uuid::new_v4().to_string();
        let response = app()
            .oneshot(request(
                Method::POST,
                "/api/billing/subscription",
                Some((user.as_str(), org.as_str(), "admin")),
                Some(json!({"plan_id": "platinum"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "UNKNOWN_PLAN");
    }

    #[tokio::test]
    async fn test_cancel_without_subscription_is_404() {
        let user = Uuid::new_v4().to_string();
        let org = Uuid::new_v4().to_string();
        let response = app()
            .oneshot(request(
                Method::POST,
                "/api/billing/subscription/cancel",
                Some((user.as_str(), org.as_str(), "admin")),
                Some(json!({"immediate": true})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "NO_ACTIVE_SUBSCRIPTION");
    }

    #[tokio::test]
    async fn test_simulate_failed_payment_marks_past_due() {
        let app = app();
        let user = Uuid::new_v4().to_string();
        let org = Uuid::new_v4().to_string();
        let identity = (user.as_str(), org.as_str(), "admin");

        app.clone()
            .oneshot(request(
                Method::POST,
                "/api/billing/subscription",
                Some(identity),
                Some(json!({"plan_id": "starter"})),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(request(
                Method::POST,
                "/api/billing/simulate-payment",
                Some(identity),
                Some(json!({"outcome": "failed"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["subscription"]["status"], "past_due");
        assert_eq!(body["event"]["status"], "failed");
    }

    #[tokio::test]
    async fn test_invariants_require_admin() {
        let user = Uuid::new_v4().to_string();
        let org = Uuid::new_v4().to_string();
        let response = app()
            .oneshot(request(
                Method::GET,
                "/api/billing/invariants",
                Some((user.as_str(), org.as_str(), "viewer")),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_invariants_healthy_after_commands() {
        let app = app();
        let user = Uuid::new_v4().to_string();
        let org = Uuid::new_v4().to_string();
        let identity = (user.as_str(), org.as_str(), "owner");

        app.clone()
            .oneshot(request(
                Method::POST,
                "/api/billing/subscription",
                Some(identity),
                Some(json!({"plan_id": "enterprise", "billing_interval": "annual"})),
            ))
            .await
            .unwrap();

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/billing/invariants",
                Some(identity),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["healthy"], true);
    }
}
