use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};

use visit_cell::router::visit_routes;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser, TEST_JWT_SECRET};

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_patient_cannot_create_visit() {
    let mock_server = MockServer::start().await;
    let app = visit_routes(Arc::new(TestConfig::with_supabase_url(&mock_server.uri()).to_app_config()));

    let user = TestUser::patient("john@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, None);
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": patient_id }])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({
            "doctor_id": Uuid::new_v4(),
            "patient_id": patient_id,
            "planned_datetime": "2024-03-01T09:00:00Z"
        }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["kind"], "access_denied");
}

#[tokio::test]
async fn test_intern_cannot_read_foreign_visit() {
    let mock_server = MockServer::start().await;
    let app = visit_routes(Arc::new(TestConfig::with_supabase_url(&mock_server.uri()).to_app_config()));

    let user = TestUser::intern("bob@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, None);
    let (intern_id, visit_id) = (Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": intern_id }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", visit_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::visit_row(
                &visit_id.to_string(),
                &Uuid::new_v4().to_string(),
                &Uuid::new_v4().to_string(),
                "planned",
                "2024-03-01T09:00:00Z",
            )
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!("/{}", visit_id))
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_doctor_list_is_scoped_to_own_and_interns() {
    let mock_server = MockServer::start().await;
    let app = visit_routes(Arc::new(TestConfig::with_supabase_url(&mock_server.uri()).to_app_config()));

    let user = TestUser::doctor("alice@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, None);
    let (doctor_id, intern_id) = (Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": doctor_id }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("mentor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": intern_id }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("doctor_id", format!("in.({},{})", doctor_id, intern_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::visit_row(
                &Uuid::new_v4().to_string(),
                &intern_id.to_string(),
                &Uuid::new_v4().to_string(),
                "planned",
                "2024-03-01T09:00:00Z",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], 1);
}

#[tokio::test]
async fn test_manager_cannot_update_visit() {
    let app = visit_routes(TestConfig::default().to_arc());

    let user = TestUser::manager("m@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, None);

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}", Uuid::new_v4()))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "notes": "x" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_intern_cannot_override_edit_lock() {
    let mock_server = MockServer::start().await;
    let app = visit_routes(Arc::new(TestConfig::with_supabase_url(&mock_server.uri()).to_app_config()));

    let user = TestUser::intern("bob@example.com");
    let token = JwtTestUtils::create_test_token(&user, TEST_JWT_SECRET, None);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}?skip_edit_check=true", Uuid::new_v4()))
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "doctor_id": Uuid::new_v4() }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["kind"], "access_denied");
}
