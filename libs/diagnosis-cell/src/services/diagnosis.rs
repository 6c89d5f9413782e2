use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::services::DoctorService;
use security_cell::RecordScope;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use visit_cell::models::Visit;
use visit_cell::services::VisitService;

use crate::models::{
    check_approval, CreateDiagnosisRequest, Diagnosis, DiagnosisError, DiagnosisSearchQuery,
    UpdateDiagnosisRequest,
};

/// Embeds the parent visit so reads carry the mirrored fields.
const SELECT_WITH_VISIT: &str = "select=*,visit:visits!inner(patient_id,doctor_id,actual_datetime,notes)";

pub struct DiagnosisService {
    supabase: SupabaseClient,
    visits: VisitService,
    doctors: DoctorService,
}

impl DiagnosisService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            visits: VisitService::new(config),
            doctors: DoctorService::new(config),
        }
    }

    pub async fn get_visit(&self, visit_id: Uuid, auth_token: &str) -> Result<Visit, DiagnosisError> {
        Ok(self.visits.get_visit(visit_id, auth_token).await?)
    }

    /// Creates a diagnosis on an already loaded `visit`.
    pub async fn create_diagnosis(
        &self,
        visit: &Visit,
        request: CreateDiagnosisRequest,
        auth_token: &str,
    ) -> Result<Diagnosis, DiagnosisError> {
        debug!("Creating diagnosis on visit {}", visit.id);

        self.ensure_disease_exists(request.disease_id, auth_token).await?;
        self.check_visit_approval(visit, request.approved, auth_token).await?;

        let now = Utc::now().to_rfc3339();
        let data = json!({
            "visit_id": visit.id,
            "disease_id": request.disease_id,
            "description": request.description,
            "approved": request.approved,
            "created_at": now,
            "updated_at": now
        });

        let path = format!("/rest/v1/diagnoses?{}", SELECT_WITH_VISIT);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            &path,
            Some(auth_token),
            Some(data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| DiagnosisError::Database("Failed to create diagnosis".to_string()))?;
        let diagnosis: Diagnosis = serde_json::from_value(row)?;
        info!("Diagnosis {} created on visit {}", diagnosis.id, diagnosis.visit_id);

        Ok(diagnosis)
    }

    pub async fn get_diagnosis(&self, diagnosis_id: Uuid, auth_token: &str) -> Result<Diagnosis, DiagnosisError> {
        debug!("Fetching diagnosis: {}", diagnosis_id);

        let path = format!("/rest/v1/diagnoses?id=eq.{}&{}", diagnosis_id, SELECT_WITH_VISIT);
        let result: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = result.into_iter().next().ok_or(DiagnosisError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn list_diagnoses(
        &self,
        query: DiagnosisSearchQuery,
        scope: &RecordScope,
        auth_token: &str,
    ) -> Result<Vec<Diagnosis>, DiagnosisError> {
        debug!("Listing diagnoses with query: {:?}", query);

        if scope.is_nothing() {
            return Ok(Vec::new());
        }

        let mut query_parts = vec![SELECT_WITH_VISIT.to_string()];

        if let Some(filter) = scope.filter_params("visit.") {
            query_parts.push(filter);
        }
        if let Some(visit_id) = query.visit_id {
            query_parts.push(format!("visit_id=eq.{}", visit_id));
        }
        if let Some(disease_id) = query.disease_id {
            query_parts.push(format!("disease_id=eq.{}", disease_id));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("visit.doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("visit.patient_id=eq.{}", patient_id));
        }
        if let Some(approved) = query.approved {
            query_parts.push(format!("approved=eq.{}", approved));
        }

        query_parts.push("order=created_at.desc".to_string());
        query_parts.push(format!("limit={}", query.limit.unwrap_or(100)));
        query_parts.push(format!("offset={}", query.offset.unwrap_or(0)));

        let path = format!("/rest/v1/diagnoses?{}", query_parts.join("&"));
        self.fetch_diagnoses(&path, auth_token).await
    }

    /// Live diagnosis history of a patient, resolved through the visits.
    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Diagnosis>, DiagnosisError> {
        let path = format!(
            "/rest/v1/diagnoses?{}&visit.patient_id=eq.{}&order=created_at.desc",
            SELECT_WITH_VISIT, patient_id
        );
        self.fetch_diagnoses(&path, auth_token).await
    }

    /// Diagnoses matching raw PostgREST `filters`, oldest first.
    pub async fn list_matching(
        &self,
        filters: &[String],
        auth_token: &str,
    ) -> Result<Vec<Diagnosis>, DiagnosisError> {
        let mut query_parts = vec![SELECT_WITH_VISIT.to_string()];
        query_parts.extend(filters.iter().cloned());
        query_parts.push("order=created_at.asc".to_string());

        let path = format!("/rest/v1/diagnoses?{}", query_parts.join("&"));
        self.fetch_diagnoses(&path, auth_token).await
    }

    pub async fn list_for_visits(
        &self,
        visit_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<Vec<Diagnosis>, DiagnosisError> {
        if visit_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = visit_ids.iter().map(Uuid::to_string).collect();
        let path = format!(
            "/rest/v1/diagnoses?{}&visit_id=in.({})&order=created_at.asc",
            SELECT_WITH_VISIT,
            ids.join(",")
        );
        self.fetch_diagnoses(&path, auth_token).await
    }

    /// Applies `request` to `current`. `target_visit` is the visit the diagnosis
    /// belongs to after the write.
    pub async fn update_diagnosis(
        &self,
        current: Diagnosis,
        target_visit: &Visit,
        request: UpdateDiagnosisRequest,
        auth_token: &str,
    ) -> Result<Diagnosis, DiagnosisError> {
        debug!("Updating diagnosis: {}", current.id);

        if let Some(disease_id) = request.disease_id {
            self.ensure_disease_exists(disease_id, auth_token).await?;
        }

        if request.needs_approval_check() {
            let approved = request.approved.unwrap_or(current.approved);
            self.check_visit_approval(target_visit, approved, auth_token).await?;
        }

        let mut update_data = serde_json::Map::new();
        if let Some(visit_id) = request.visit_id {
            update_data.insert("visit_id".to_string(), json!(visit_id));
        }
        if let Some(disease_id) = request.disease_id {
            update_data.insert("disease_id".to_string(), json!(disease_id));
        }
        if let Some(description) = request.description {
            update_data.insert("description".to_string(), json!(description));
        }
        if let Some(approved) = request.approved {
            update_data.insert("approved".to_string(), json!(approved));
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/diagnoses?id=eq.{}&{}", current.id, SELECT_WITH_VISIT);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(DiagnosisError::NotFound)?;
        let diagnosis: Diagnosis = serde_json::from_value(row)?;
        info!("Diagnosis {} updated", diagnosis.id);

        Ok(diagnosis)
    }

    pub async fn delete_diagnosis(&self, diagnosis_id: Uuid, auth_token: &str) -> Result<(), DiagnosisError> {
        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &format!("/rest/v1/diagnoses?id=eq.{}", diagnosis_id),
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if deleted.is_empty() {
            return Err(DiagnosisError::NotFound);
        }

        info!("Diagnosis {} deleted", diagnosis_id);
        Ok(())
    }

    async fn check_visit_approval(
        &self,
        visit: &Visit,
        approved: bool,
        auth_token: &str,
    ) -> Result<(), DiagnosisError> {
        let doctor = self.doctors.get_doctor(visit.doctor_id, auth_token).await?;
        check_approval(doctor.is_intern, approved).inspect_err(|_| {
            warn!(
                "Unapproved diagnosis by intern {} on visit {}",
                doctor.id, visit.id
            );
        })
    }

    async fn ensure_disease_exists(&self, disease_id: Uuid, auth_token: &str) -> Result<(), DiagnosisError> {
        let path = format!("/rest/v1/diseases?id=eq.{}&select=id", disease_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        if rows.is_empty() {
            return Err(DiagnosisError::DiseaseNotFound);
        }
        Ok(())
    }

    async fn fetch_diagnoses(&self, path: &str, auth_token: &str) -> Result<Vec<Diagnosis>, DiagnosisError> {
        let result: Vec<Value> = self.supabase.request(Method::GET, path, Some(auth_token), None).await?;

        Ok(result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Diagnosis>, _>>()?)
    }
}
