use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{body_partial_json, method, path, query_param};

use visit_cell::models::{CreateVisitRequest, UpdateVisitRequest, Visit, VisitError, VisitStatus, WriteOptions};
use visit_cell::services::VisitService;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn create_request(doctor_id: Uuid, patient_id: Uuid, planned: &str) -> CreateVisitRequest {
    CreateVisitRequest {
        doctor_id,
        patient_id,
        status: VisitStatus::Planned,
        planned_datetime: Some(planned.parse().unwrap()),
        actual_datetime: None,
        notes: None,
    }
}

#[tokio::test]
async fn test_second_visit_on_same_day_is_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let (doctor_id, patient_id) = (Uuid::new_v4(), Uuid::new_v4());

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("planned_datetime", "gte.2024-03-01T00:00:00Z"))
        .and(query_param("planned_datetime", "lt.2024-03-02T00:00:00Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::visit_row(
                &Uuid::new_v4().to_string(),
                &doctor_id.to_string(),
                &patient_id.to_string(),
                "planned",
                "2024-03-01T09:00:00Z",
            )
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = VisitService::new(&config)
        .create_visit(create_request(doctor_id, patient_id, "2024-03-01T11:00:00Z"), WriteOptions::default(), "token")
        .await;

    assert_matches!(result, Err(VisitError::Duplicate));
}

#[tokio::test]
async fn test_create_visit_when_day_is_free() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let (doctor_id, patient_id) = (Uuid::new_v4(), Uuid::new_v4());
    let visit_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/visits"))
        .and(body_partial_json(json!({ "status": "planned", "doctor_id": doctor_id })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::visit_row(
                &visit_id.to_string(),
                &doctor_id.to_string(),
                &patient_id.to_string(),
                "planned",
                "2024-03-02T09:00:00Z",
            )
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let visit = VisitService::new(&config)
        .create_visit(create_request(doctor_id, patient_id, "2024-03-02T09:00:00Z"), WriteOptions::default(), "token")
        .await
        .unwrap();

    assert_eq!(visit.id, visit_id);
    assert_eq!(visit.status, VisitStatus::Planned);
}

#[tokio::test]
async fn test_completed_visit_rejects_doctor_change() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let (visit_id, doctor_id, patient_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let planned_row = MockSupabaseResponses::visit_row(
        &visit_id.to_string(),
        &doctor_id.to_string(),
        &patient_id.to_string(),
        "planned",
        "2024-03-01T09:00:00Z",
    );
    let mut done_row = planned_row.clone();
    done_row["status"] = json!("done");
    done_row["actual_datetime"] = json!("2024-03-01T09:15:00Z");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(body_partial_json(json!({ "status": "done" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([done_row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = VisitService::new(&config);
    let planned: Visit = serde_json::from_value(planned_row).unwrap();

    let done = service
        .complete_visit(planned, Some("2024-03-01T09:15:00Z".parse().unwrap()), "token")
        .await
        .unwrap();
    assert!(done.is_done());

    let reassign = UpdateVisitRequest {
        doctor_id: Some(Uuid::new_v4()),
        ..Default::default()
    };
    let result = service.apply_update(done.clone(), reassign, WriteOptions::default(), "token").await;
    assert_matches!(result, Err(VisitError::EditLocked));
}

#[tokio::test]
async fn test_notes_stay_editable_after_completion() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let visit_id = Uuid::new_v4();

    let mut done_row = MockSupabaseResponses::visit_row(
        &visit_id.to_string(),
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        "done",
        "2024-03-01T09:00:00Z",
    );
    let done: Visit = serde_json::from_value(done_row.clone()).unwrap();
    done_row["notes"] = json!("Recovered");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", visit_id)))
        .and(body_partial_json(json!({ "notes": "Recovered" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([done_row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = UpdateVisitRequest {
        notes: Some("Recovered".to_string()),
        ..Default::default()
    };

    let visit = VisitService::new(&config)
        .apply_update(done, request, WriteOptions::default(), "token")
        .await
        .unwrap();

    assert_eq!(visit.notes.as_deref(), Some("Recovered"));
}

#[tokio::test]
async fn test_clearing_planned_time_writes_null_without_duplicate_lookup() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let visit_id = Uuid::new_v4();

    let mut planned_row = MockSupabaseResponses::visit_row(
        &visit_id.to_string(),
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        "planned",
        "2024-03-01T09:00:00Z",
    );
    planned_row["notes"] = json!("Bring X-ray");
    let planned: Visit = serde_json::from_value(planned_row.clone()).unwrap();
    planned_row["planned_datetime"] = json!(null);
    planned_row["notes"] = json!(null);

    Mock::given(method("GET"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", visit_id)))
        .and(body_partial_json(json!({ "planned_datetime": null, "notes": null })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([planned_row])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = UpdateVisitRequest {
        clear_planned_datetime: true,
        clear_notes: true,
        ..Default::default()
    };

    let visit = VisitService::new(&config)
        .apply_update(planned, request, WriteOptions::default(), "token")
        .await
        .unwrap();

    assert_eq!(visit.planned_datetime, None);
    assert_eq!(visit.notes, None);
}

#[tokio::test]
async fn test_visit_with_diagnoses_cannot_be_deleted() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let visit_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/diagnoses"))
        .and(query_param("visit_id", format!("eq.{}", visit_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/visits"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = VisitService::new(&config).delete_visit(visit_id, "token").await;
    assert_matches!(result, Err(VisitError::HasDiagnoses));
}

#[tokio::test]
async fn test_visit_without_diagnoses_is_deleted() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    let visit_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/diagnoses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/visits"))
        .and(query_param("id", format!("eq.{}", visit_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": visit_id }])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = VisitService::new(&config).delete_visit(visit_id, "token").await;
    assert!(result.is_ok());
}
