use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;
use chrono::Utc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    validate_specialty_name, CreateSpecialtyRequest, DoctorError, Specialty,
    UpdateSpecialtyRequest,
};

pub struct SpecialtyService {
    supabase: SupabaseClient,
}

impl SpecialtyService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn list_specialties(&self, auth_token: &str) -> Result<Vec<Specialty>, DoctorError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            "/rest/v1/specialties?order=name.asc",
            Some(auth_token),
            None,
        ).await?;

        Ok(result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Specialty>, _>>()?)
    }

    pub async fn get_specialty(&self, specialty_id: Uuid, auth_token: &str) -> Result<Specialty, DoctorError> {
        let path = format!("/rest/v1/specialties?id=eq.{}", specialty_id);
        let result: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = result.into_iter().next().ok_or(DoctorError::SpecialtyNotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn create_specialty(
        &self,
        request: CreateSpecialtyRequest,
        auth_token: &str,
    ) -> Result<Specialty, DoctorError> {
        let name = validate_specialty_name(&request.name)?;
        debug!("Creating specialty {}", name);

        let data = json!({
            "name": name,
            "translations": request.translations.unwrap_or_default(),
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/specialties",
            Some(auth_token),
            Some(data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| DoctorError::Database("Failed to create specialty".to_string()))?;
        let specialty: Specialty = serde_json::from_value(row)?;
        info!("Specialty {} created with ID {}", specialty.name, specialty.id);

        Ok(specialty)
    }

    pub async fn update_specialty(
        &self,
        specialty_id: Uuid,
        request: UpdateSpecialtyRequest,
        auth_token: &str,
    ) -> Result<Specialty, DoctorError> {
        let mut update_data = serde_json::Map::new();
        if let Some(name) = &request.name {
            update_data.insert("name".to_string(), json!(validate_specialty_name(name)?));
        }
        if let Some(translations) = request.translations {
            update_data.insert("translations".to_string(), json!(translations));
        }
        if update_data.is_empty() {
            return self.get_specialty(specialty_id, auth_token).await;
        }

        let path = format!("/rest/v1/specialties?id=eq.{}", specialty_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(DoctorError::SpecialtyNotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// Doctors keep their card; the FK clears their specialty.
    pub async fn delete_specialty(&self, specialty_id: Uuid, auth_token: &str) -> Result<(), DoctorError> {
        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &format!("/rest/v1/specialties?id=eq.{}", specialty_id),
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if deleted.is_empty() {
            return Err(DoctorError::SpecialtyNotFound);
        }

        info!("Specialty {} deleted", specialty_id);
        Ok(())
    }
}
