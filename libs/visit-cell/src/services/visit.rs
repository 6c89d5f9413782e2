use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use security_cell::RecordScope;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreateVisitRequest, UpdateVisitRequest, Visit, VisitError, VisitField, VisitSearchQuery,
    VisitStatus, WriteOptions,
};
use crate::services::duplicate::DuplicateVisitService;
use crate::services::lifecycle::VisitLifecycleService;

pub struct VisitService {
    supabase: Arc<SupabaseClient>,
    duplicates: DuplicateVisitService,
    lifecycle: VisitLifecycleService,
}

impl VisitService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            duplicates: DuplicateVisitService::new(Arc::clone(&supabase)),
            lifecycle: VisitLifecycleService::new(),
            supabase,
        }
    }

    pub async fn create_visit(
        &self,
        request: CreateVisitRequest,
        options: WriteOptions,
        auth_token: &str,
    ) -> Result<Visit, VisitError> {
        debug!("Creating visit for doctor {} and patient {}", request.doctor_id, request.patient_id);

        self.lifecycle.check_edit_lock(
            None,
            request.status,
            &VisitLifecycleService::fields_on_create(),
            options,
        )?;

        let now = Utc::now();
        let candidate = Visit {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            patient_id: request.patient_id,
            status: request.status,
            planned_datetime: request.planned_datetime,
            actual_datetime: request.actual_datetime,
            notes: request.notes,
            created_at: now,
            updated_at: now,
        };

        self.duplicates.ensure_no_duplicate(&candidate, auth_token).await?;

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/visits",
            Some(auth_token),
            Some(serde_json::to_value(&candidate)?),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| VisitError::Database("Failed to create visit".to_string()))?;
        let visit: Visit = serde_json::from_value(row)?;
        info!("Visit {} created ({})", visit.id, visit.status);

        Ok(visit)
    }

    pub async fn get_visit(&self, visit_id: Uuid, auth_token: &str) -> Result<Visit, VisitError> {
        debug!("Fetching visit: {}", visit_id);

        let path = format!("/rest/v1/visits?id=eq.{}", visit_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let row = result.into_iter().next().ok_or(VisitError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// Visits matching `query`, restricted to what `scope` may see.
    pub async fn list_visits(
        &self,
        query: VisitSearchQuery,
        scope: &RecordScope,
        auth_token: &str,
    ) -> Result<Vec<Visit>, VisitError> {
        debug!("Listing visits with query: {:?}", query);

        let mut query_parts = vec![];

        if let Some(filter) = scope.filter_params("") {
            query_parts.push(filter);
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from) = query.planned_from {
            query_parts.push(format!("planned_datetime=gte.{}", from.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        if let Some(to) = query.planned_to {
            query_parts.push(format!("planned_datetime=lte.{}", to.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        query_parts.push("order=planned_datetime.desc.nullslast".to_string());
        query_parts.push(format!("limit={}", query.limit.unwrap_or(100)));
        query_parts.push(format!("offset={}", query.offset.unwrap_or(0)));

        let path = format!("/rest/v1/visits?{}", query_parts.join("&"));
        self.fetch_visits(&path, auth_token).await
    }

    /// All visits of the given doctors in stored order.
    pub async fn list_for_doctors(
        &self,
        doctor_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<Vec<Visit>, VisitError> {
        if doctor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = doctor_ids.iter().map(Uuid::to_string).collect();
        let path = format!("/rest/v1/visits?doctor_id=in.({})&order=created_at.asc", ids.join(","));
        self.fetch_visits(&path, auth_token).await
    }

    pub async fn update_visit(
        &self,
        visit_id: Uuid,
        request: UpdateVisitRequest,
        options: WriteOptions,
        auth_token: &str,
    ) -> Result<Visit, VisitError> {
        let current = self.get_visit(visit_id, auth_token).await?;
        self.apply_update(current, request, options, auth_token).await
    }

    /// Writes `request` on top of an already loaded visit.
    pub async fn apply_update(
        &self,
        current: Visit,
        request: UpdateVisitRequest,
        options: WriteOptions,
        auth_token: &str,
    ) -> Result<Visit, VisitError> {
        debug!("Updating visit: {}", current.id);

        let changed = request.changed_fields();
        if changed.is_empty() {
            return Ok(current);
        }

        let updated = request.apply_to(&current);
        self.lifecycle.check_edit_lock(Some(current.status), updated.status, &changed, options)?;

        if VisitLifecycleService::needs_duplicate_check(&changed) {
            self.duplicates.ensure_no_duplicate(&updated, auth_token).await?;
        }

        let mut update_data = serde_json::Map::new();
        for field in &changed {
            let value = match field {
                VisitField::DoctorId => json!(updated.doctor_id),
                VisitField::PatientId => json!(updated.patient_id),
                VisitField::Status => json!(updated.status),
                VisitField::PlannedDatetime => json!(updated.planned_datetime),
                VisitField::ActualDatetime => json!(updated.actual_datetime),
                VisitField::Notes => json!(updated.notes),
            };
            update_data.insert(field.to_string(), value);
        }
        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/visits?id=eq.{}", current.id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(VisitError::NotFound)?;
        let visit: Visit = serde_json::from_value(row)?;
        info!("Visit {} updated ({:?})", visit.id, changed);

        Ok(visit)
    }

    /// Marks the visit done and stamps the actual time in one write.
    pub async fn complete_visit(
        &self,
        current: Visit,
        actual_datetime: Option<chrono::DateTime<Utc>>,
        auth_token: &str,
    ) -> Result<Visit, VisitError> {
        let request = UpdateVisitRequest {
            status: Some(VisitStatus::Done),
            actual_datetime: Some(actual_datetime.unwrap_or_else(Utc::now)),
            ..Default::default()
        };
        self.apply_update(current, request, WriteOptions::system(), auth_token).await
    }

    pub async fn has_diagnoses(&self, visit_id: Uuid, auth_token: &str) -> Result<bool, VisitError> {
        let path = format!("/rest/v1/diagnoses?visit_id=eq.{}&select=id&limit=1", visit_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(!rows.is_empty())
    }

    pub async fn delete_visit(&self, visit_id: Uuid, auth_token: &str) -> Result<(), VisitError> {
        debug!("Deleting visit: {}", visit_id);

        if self.has_diagnoses(visit_id, auth_token).await? {
            return Err(VisitError::HasDiagnoses);
        }

        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &format!("/rest/v1/visits?id=eq.{}", visit_id),
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if deleted.is_empty() {
            return Err(VisitError::NotFound);
        }

        info!("Visit {} deleted", visit_id);
        Ok(())
    }

    async fn fetch_visits(&self, path: &str, auth_token: &str) -> Result<Vec<Visit>, VisitError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await?;

        Ok(result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Visit>, _>>()?)
    }
}
