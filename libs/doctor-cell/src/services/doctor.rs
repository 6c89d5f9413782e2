use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;
use chrono::Utc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    validate_mentor, CreateDoctorRequest, Doctor, DoctorError, DoctorProfile,
    DoctorSearchQuery, UpdateDoctorRequest,
};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a new doctor card
    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let person = request.person();
        person.validate().map_err(DoctorError::Validation)?;
        debug!("Creating doctor {}", person.full_name());

        if let Some(mentor_id) = request.mentor_id {
            let mentor = self.get_mentor(mentor_id, auth_token).await?;
            validate_mentor(None, &mentor)?;
        }
        if let Some(specialty_id) = request.specialty_id {
            self.ensure_specialty_exists(specialty_id, auth_token).await?;
        }

        let doctor_data = json!({
            "first_name": person.first_name,
            "last_name": person.last_name,
            "name": person.full_name(),
            "phone": person.phone,
            "photo_url": person.photo_url,
            "gender": person.gender,
            "user_id": person.user_id,
            "specialty_id": request.specialty_id,
            "is_intern": request.is_intern,
            "mentor_id": request.mentor_id,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctors",
            Some(auth_token),
            Some(doctor_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| DoctorError::Database("Failed to create doctor".to_string()))?;
        let doctor: Doctor = serde_json::from_value(row)?;
        info!("Doctor {} created with ID {}", doctor.full_name(), doctor.id);

        Ok(doctor)
    }

    /// Get doctor by ID
    pub async fn get_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let row = result.into_iter().next().ok_or(DoctorError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// Doctor card with the derived intern summary
    pub async fn get_doctor_profile(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorProfile, DoctorError> {
        let doctor = self.get_doctor(doctor_id, auth_token).await?;
        let interns = self.list_interns(doctor_id, auth_token).await?;
        Ok(DoctorProfile::new(doctor, &interns))
    }

    pub async fn get_doctors(
        &self,
        doctor_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        if doctor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = doctor_ids.iter().map(Uuid::to_string).collect();
        let path = format!("/rest/v1/doctors?id=in.({})", ids.join(","));
        self.fetch_doctors(&path, auth_token).await
    }

    /// Doctors whose mentor is `mentor_id`
    pub async fn list_interns(
        &self,
        mentor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        let path = format!("/rest/v1/doctors?mentor_id=eq.{}&order=last_name.asc,first_name.asc", mentor_id);
        self.fetch_doctors(&path, auth_token).await
    }

    /// Search doctors with filters
    pub async fn search_doctors(
        &self,
        query: DoctorSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Searching doctors with query: {:?}", query);

        let mut query_parts = vec![];

        if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            query_parts.push(format!("name=ilike.*{}*", urlencoding::encode(name)));
        }
        if let Some(specialty_id) = query.specialty_id {
            query_parts.push(format!("specialty_id=eq.{}", specialty_id));
        }
        if let Some(is_intern) = query.is_intern {
            query_parts.push(format!("is_intern=eq.{}", is_intern));
        }
        if let Some(mentor_id) = query.mentor_id {
            query_parts.push(format!("mentor_id=eq.{}", mentor_id));
        }

        query_parts.push("order=name.asc".to_string());
        query_parts.push(format!("limit={}", query.limit.unwrap_or(50)));
        query_parts.push(format!("offset={}", query.offset.unwrap_or(0)));

        let path = format!("/rest/v1/doctors?{}", query_parts.join("&"));
        self.fetch_doctors(&path, auth_token).await
    }

    /// Update doctor card. The stored name is recomputed whenever a name part changes.
    pub async fn update_doctor(
        &self,
        doctor_id: Uuid,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor: {}", doctor_id);

        let current = self.get_doctor(doctor_id, auth_token).await?;

        let mut person = current.person.clone();
        if let Some(first_name) = &request.first_name {
            person.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = &request.last_name {
            person.last_name = last_name.trim().to_string();
        }
        if let Some(phone) = &request.phone {
            person.phone = Some(phone.clone());
        }
        person.validate().map_err(DoctorError::Validation)?;

        if let Some(mentor_id) = request.new_mentor() {
            let mentor = self.get_mentor(mentor_id, auth_token).await?;
            validate_mentor(Some(doctor_id), &mentor)?;
        }

        if request.is_intern == Some(true) && !current.is_intern {
            let interns = self.list_interns(doctor_id, auth_token).await?;
            if !interns.is_empty() {
                warn!("Doctor {} mentors {} interns, refusing intern flag", doctor_id, interns.len());
                return Err(DoctorError::InvalidMentor(format!(
                    "{} mentors {} intern(s) and cannot become an intern",
                    current.full_name(),
                    interns.len()
                )));
            }
        }

        if let Some(specialty_id) = request.specialty_id {
            self.ensure_specialty_exists(specialty_id, auth_token).await?;
        }

        let mut update_data = serde_json::Map::new();

        if request.touches_name() {
            update_data.insert("first_name".to_string(), json!(person.first_name));
            update_data.insert("last_name".to_string(), json!(person.last_name));
            update_data.insert("name".to_string(), json!(person.full_name()));
        }
        if let Some(phone) = request.phone {
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(photo_url) = request.photo_url {
            update_data.insert("photo_url".to_string(), json!(photo_url));
        }
        if let Some(gender) = request.gender {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(user_id) = request.user_id {
            update_data.insert("user_id".to_string(), json!(user_id));
        }
        if let Some(specialty_id) = request.specialty_id {
            update_data.insert("specialty_id".to_string(), json!(specialty_id));
        }
        if let Some(is_intern) = request.is_intern {
            update_data.insert("is_intern".to_string(), json!(is_intern));
        }
        if request.clear_mentor {
            update_data.insert("mentor_id".to_string(), Value::Null);
        } else if let Some(mentor_id) = request.mentor_id {
            update_data.insert("mentor_id".to_string(), json!(mentor_id));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| DoctorError::Database("Failed to update doctor".to_string()))?;
        let updated: Doctor = serde_json::from_value(row)?;
        info!("Doctor {} updated", updated.id);

        Ok(updated)
    }

    /// Delete a doctor without visit history. Interns lose their mentor and
    /// patients lose their personal doctor through `ON DELETE SET NULL`, so the
    /// unlinking commits or rolls back with the single DELETE.
    pub async fn delete_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        debug!("Deleting doctor: {}", doctor_id);

        let path = format!("/rest/v1/visits?doctor_id=eq.{}&select=id&limit=1", doctor_id);
        let visits: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        if !visits.is_empty() {
            return Err(DoctorError::Validation(
                "You cannot delete a doctor who has visits.".to_string(),
            ));
        }

        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &format!("/rest/v1/doctors?id=eq.{}", doctor_id),
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if deleted.is_empty() {
            return Err(DoctorError::NotFound);
        }

        info!("Doctor {} deleted", doctor_id);
        Ok(())
    }

    async fn get_mentor(&self, mentor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        match self.get_doctor(mentor_id, auth_token).await {
            Err(DoctorError::NotFound) => Err(DoctorError::MentorNotFound),
            other => other,
        }
    }

    async fn ensure_specialty_exists(&self, specialty_id: Uuid, auth_token: &str) -> Result<(), DoctorError> {
        let path = format!("/rest/v1/specialties?id=eq.{}&select=id", specialty_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        if rows.is_empty() {
            return Err(DoctorError::SpecialtyNotFound);
        }
        Ok(())
    }

    async fn fetch_doctors(&self, path: &str, auth_token: &str) -> Result<Vec<Doctor>, DoctorError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(auth_token),
            None,
        ).await?;

        let doctors = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Doctor>, _>>()?;

        Ok(doctors)
    }
}
