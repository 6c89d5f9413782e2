use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use doctor_cell::models::{CreateDoctorRequest, DoctorError, UpdateDoctorRequest};
use doctor_cell::services::{DoctorService, SpecialtyService};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn create_request(first: &str, last: &str, mentor_id: Option<Uuid>) -> CreateDoctorRequest {
    CreateDoctorRequest {
        first_name: first.to_string(),
        last_name: last.to_string(),
        phone: None,
        photo_url: None,
        gender: None,
        user_id: None,
        specialty_id: None,
        is_intern: mentor_id.is_some(),
        mentor_id,
    }
}

#[tokio::test]
async fn test_create_intern_with_intern_mentor_fails() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let mentor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", mentor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&mentor_id.to_string(), "Bob", "Intern", true, None)
        ])))
        .mount(&mock_server)
        .await;

    let result = DoctorService::new(&config)
        .create_doctor(create_request("Carol", "New", Some(mentor_id)), "token")
        .await;

    assert_matches!(result, Err(DoctorError::InvalidMentor(msg)) if msg.contains("Bob Intern"));
}

#[tokio::test]
async fn test_create_with_unknown_mentor_fails() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = DoctorService::new(&config)
        .create_doctor(create_request("Carol", "New", Some(Uuid::new_v4())), "token")
        .await;

    assert_matches!(result, Err(DoctorError::MentorNotFound));
}

#[tokio::test]
async fn test_create_doctor_stores_full_name() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .and(body_partial_json(json!({ "name": "Alice Smith", "is_intern": false })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&doctor_id.to_string(), "Alice", "Smith", false, None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let doctor = DoctorService::new(&config)
        .create_doctor(create_request(" Alice ", "Smith", None), "token")
        .await
        .unwrap();

    assert_eq!(doctor.id, doctor_id);
    assert_eq!(doctor.full_name(), "Alice Smith");
}

#[tokio::test]
async fn test_create_doctor_requires_names() {
    let config = TestConfig::default().to_app_config();

    let result = DoctorService::new(&config)
        .create_doctor(create_request("  ", "Smith", None), "token")
        .await;

    assert_matches!(result, Err(DoctorError::Validation(msg)) if msg == "First name is required");
}

#[tokio::test]
async fn test_update_last_name_rewrites_stored_name() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&doctor_id.to_string(), "Alice", "Smith", false, None)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .and(body_partial_json(json!({
            "first_name": "Alice",
            "last_name": "Jones",
            "name": "Alice Jones"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&doctor_id.to_string(), "Alice", "Jones", false, None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = UpdateDoctorRequest {
        last_name: Some("Jones".to_string()),
        ..Default::default()
    };

    let doctor = DoctorService::new(&config)
        .update_doctor(doctor_id, request, "token")
        .await
        .unwrap();

    assert_eq!(doctor.name, "Alice Jones");
}

#[tokio::test]
async fn test_mentor_with_interns_cannot_become_intern() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let intern_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&doctor_id.to_string(), "Alice", "Mentor", false, None)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("mentor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(
                &intern_id.to_string(), "Bob", "Intern", true, Some(&doctor_id.to_string())
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let request = UpdateDoctorRequest {
        is_intern: Some(true),
        ..Default::default()
    };

    let result = DoctorService::new(&config).update_doctor(doctor_id, request, "token").await;
    assert_matches!(result, Err(DoctorError::InvalidMentor(_)));
}

#[tokio::test]
async fn test_profile_lists_interns() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let mentor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", mentor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&mentor_id, "Alice", "Mentor", false, None)
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("mentor_id", format!("eq.{}", mentor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&Uuid::new_v4().to_string(), "Bob", "First", true, Some(&mentor_id)),
            MockSupabaseResponses::doctor_row(&Uuid::new_v4().to_string(), "Carol", "Second", true, Some(&mentor_id)),
        ])))
        .mount(&mock_server)
        .await;

    let profile = DoctorService::new(&config)
        .get_doctor_profile(mentor_id.parse().unwrap(), "token")
        .await
        .unwrap();

    assert_eq!(profile.interns_names, "Bob First, Carol Second");
    assert_eq!(profile.intern_ids.len(), 2);
}

#[tokio::test]
async fn test_doctor_with_visits_cannot_be_deleted() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = DoctorService::new(&config).delete_doctor(doctor_id, "token").await;
    assert_matches!(result, Err(DoctorError::Validation(_)));
}

#[tokio::test]
async fn test_rejected_delete_leaves_links_untouched() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23503",
            "message": "update or delete on table \"doctors\" violates foreign key constraint \"visits_doctor_id_fkey\""
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = DoctorService::new(&config).delete_doctor(doctor_id, "token").await;
    assert_matches!(result, Err(DoctorError::Database(_)));
}

#[tokio::test]
async fn test_delete_doctor_is_a_single_write() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&doctor_id.to_string(), "Alice", "Smith", false, None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    DoctorService::new(&config).delete_doctor(doctor_id, "token").await.unwrap();
}

#[tokio::test]
async fn test_update_can_clear_mentor() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let intern_id = Uuid::new_v4();
    let mentor_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", intern_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&intern_id.to_string(), "Bob", "Intern", true, Some(&mentor_id))
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctors"))
        .and(body_partial_json(json!({ "is_intern": false, "mentor_id": null })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&intern_id.to_string(), "Bob", "Intern", false, None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = UpdateDoctorRequest {
        is_intern: Some(false),
        clear_mentor: true,
        ..Default::default()
    };

    let doctor = DoctorService::new(&config)
        .update_doctor(intern_id, request, "token")
        .await
        .unwrap();

    assert!(!doctor.is_intern);
    assert_eq!(doctor.mentor_id, None);
}

#[tokio::test]
async fn test_search_filters_by_name_and_intern_flag() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("name", "ilike.*Bob*"))
        .and(query_param("is_intern", "eq.true"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(&Uuid::new_v4().to_string(), "Bob", "Intern", true, None)
        ])))
        .mount(&mock_server)
        .await;

    let query = doctor_cell::models::DoctorSearchQuery {
        name: Some("Bob".to_string()),
        is_intern: Some(true),
        ..Default::default()
    };

    let doctors = DoctorService::new(&config).search_doctors(query, "token").await.unwrap();
    assert_eq!(doctors.len(), 1);
    assert!(doctors[0].is_intern);
}

#[tokio::test]
async fn test_specialty_lookup() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let specialty_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/specialties"))
        .and(query_param("id", format!("eq.{}", specialty_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::specialty_row(&specialty_id.to_string(), "Cardiology")
        ])))
        .mount(&mock_server)
        .await;

    let specialty = SpecialtyService::new(&config)
        .get_specialty(specialty_id, "token")
        .await
        .unwrap();

    assert_eq!(specialty.localized_name("uk"), "Cardiology");
}
