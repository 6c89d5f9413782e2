use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use patient_cell::{
    BulkAssignDoctorRequest, BulkAssignService, CreatePatientRequest, PatientError, PatientService,
    UpdatePatientRequest,
};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

#[tokio::test]
async fn test_bulk_assign_writes_each_patient() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let (doctor_id, patient_id) = (Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": doctor_id }])))
        .mount(&mock_server)
        .await;

    let mut row = MockSupabaseResponses::patient_row(&patient_id.to_string(), "John", "Doe");
    row["personal_doctor_id"] = json!(doctor_id);

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .and(body_partial_json(json!({ "personal_doctor_id": doctor_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = BulkAssignService::new(&config)
        .assign_doctor(
            BulkAssignDoctorRequest { doctor_id, patient_ids: vec![patient_id] },
            "token",
        )
        .await
        .unwrap();

    assert_eq!(result.updated, vec![patient_id]);
    assert!(result.failed.is_none());
}

#[tokio::test]
async fn test_bulk_assign_stops_at_first_failure() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let doctor_id = Uuid::new_v4();
    let (first, missing, never) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": doctor_id }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", first)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&first.to_string(), "Ann", "First")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", missing)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", never)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = BulkAssignService::new(&config)
        .assign_doctor(
            BulkAssignDoctorRequest { doctor_id, patient_ids: vec![first, missing, never] },
            "token",
        )
        .await
        .unwrap();

    assert_eq!(result.updated, vec![first]);
    let failed = result.failed.unwrap();
    assert_eq!(failed.patient_id, missing);
    assert_eq!(failed.error, "Patient not found");
}

#[tokio::test]
async fn test_bulk_assign_unknown_doctor() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = BulkAssignService::new(&config)
        .assign_doctor(
            BulkAssignDoctorRequest { doctor_id: Uuid::new_v4(), patient_ids: vec![Uuid::new_v4()] },
            "token",
        )
        .await;

    assert_matches!(result, Err(PatientError::DoctorNotFound));
}

#[tokio::test]
async fn test_update_rewrites_stored_name() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id.to_string(), "John", "Doe")
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "first_name": "John", "last_name": "Smith", "name": "John Smith" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id.to_string(), "John", "Smith")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = UpdatePatientRequest {
        last_name: Some("Smith".to_string()),
        ..Default::default()
    };
    let patient = PatientService::new(&config)
        .update_patient(patient_id, request, "token")
        .await
        .unwrap();

    assert_eq!(patient.name, "John Smith");
}

#[tokio::test]
async fn test_create_patient_stores_trimmed_full_name() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let patient_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({
            "first_name": "Alice",
            "last_name": "Smith",
            "name": "Alice Smith"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id.to_string(), "Alice", "Smith")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = CreatePatientRequest {
        first_name: "Alice ".to_string(),
        last_name: " Smith".to_string(),
        phone: None,
        photo_url: None,
        gender: None,
        user_id: None,
        personal_doctor_id: None,
        birth_date: None,
        passport_data: None,
        contact_person: None,
    };

    let patient = PatientService::new(&config)
        .create_patient(request, "token")
        .await
        .unwrap();

    assert_eq!(patient.id, patient_id);
    assert_eq!(patient.full_name(), "Alice Smith");
}

#[tokio::test]
async fn test_update_can_unassign_personal_doctor() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let patient_id = Uuid::new_v4();

    let mut row = MockSupabaseResponses::patient_row(&patient_id.to_string(), "John", "Doe");
    row["personal_doctor_id"] = json!(Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/patients"))
        .and(body_partial_json(json!({ "personal_doctor_id": null })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_row(&patient_id.to_string(), "John", "Doe")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request: UpdatePatientRequest = serde_json::from_value(json!({
        "personal_doctor_id": Uuid::new_v4(),
        "clear_personal_doctor": true
    }))
    .unwrap();

    let patient = PatientService::new(&config)
        .update_patient(patient_id, request, "token")
        .await
        .unwrap();

    assert_eq!(patient.personal_doctor_id, None);
}

#[tokio::test]
async fn test_patient_with_visits_cannot_be_deleted() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = PatientService::new(&config).delete_patient(patient_id, "token").await;
    assert_matches!(result, Err(PatientError::Validation(_)));
}

#[tokio::test]
async fn test_profile_includes_age() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let patient_id = Uuid::new_v4();

    let mut row = MockSupabaseResponses::patient_row(&patient_id.to_string(), "Jane", "Roe");
    row["birth_date"] = json!("1990-05-20");
    row["name"] = json!("");

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let profile = PatientService::new(&config)
        .get_patient_profile(patient_id, "token")
        .await
        .unwrap();

    assert_eq!(profile.patient.name, "Jane Roe");
    assert!(profile.age >= 34);
}
