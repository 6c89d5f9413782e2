use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;
use chrono::Utc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    CreatePatientRequest, Patient, PatientError, PatientProfile, PatientSearchQuery,
    UpdatePatientRequest,
};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let person = request.person();
        person.validate().map_err(PatientError::Validation)?;
        debug!("Creating new patient card for: {}", person.full_name());

        if let Some(doctor_id) = request.personal_doctor_id {
            self.ensure_doctor_exists(doctor_id, auth_token).await?;
        }

        let patient_data = json!({
            "first_name": person.first_name,
            "last_name": person.last_name,
            "name": person.full_name(),
            "phone": person.phone,
            "photo_url": person.photo_url,
            "gender": person.gender,
            "user_id": person.user_id,
            "personal_doctor_id": request.personal_doctor_id,
            "birth_date": request.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "passport_data": request.passport_data,
            "contact_person": request.contact_person,
            "created_at": Utc::now().to_rfc3339(),
            "updated_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patients",
            Some(auth_token),
            Some(patient_data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| PatientError::Database("Failed to create patient card".to_string()))?;
        let patient: Patient = serde_json::from_value(row)?;
        info!("Patient card created with ID: {}", patient.id);

        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient card: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn get_patient_profile(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<PatientProfile, PatientError> {
        let patient = self.get_patient(patient_id, auth_token).await?;
        Ok(PatientProfile::new(patient))
    }

    pub async fn update_patient(
        &self,
        patient_id: Uuid,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient card: {}", patient_id);

        let current = self.get_patient(patient_id, auth_token).await?;

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
        person.validate().map_err(PatientError::Validation)?;

        if let Some(doctor_id) = request.personal_doctor_id.filter(|_| !request.clear_personal_doctor) {
            self.ensure_doctor_exists(doctor_id, auth_token).await?;
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
        if request.clear_personal_doctor {
            update_data.insert("personal_doctor_id".to_string(), Value::Null);
        } else if let Some(doctor_id) = request.personal_doctor_id {
            update_data.insert("personal_doctor_id".to_string(), json!(doctor_id));
        }
        if let Some(birth_date) = request.birth_date {
            update_data.insert("birth_date".to_string(), json!(birth_date.format("%Y-%m-%d").to_string()));
        }
        if let Some(passport_data) = request.passport_data {
            update_data.insert("passport_data".to_string(), json!(passport_data));
        }
        if let Some(contact_person) = request.contact_person {
            update_data.insert("contact_person".to_string(), json!(contact_person));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.patch_patient(patient_id, Value::Object(update_data), auth_token).await
    }

    /// Points the patient at a new personal doctor.
    pub async fn assign_personal_doctor(
        &self,
        patient_id: Uuid,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let data = json!({
            "personal_doctor_id": doctor_id,
            "updated_at": Utc::now().to_rfc3339()
        });
        self.patch_patient(patient_id, data, auth_token).await
    }

    /// `restrict_to` limits the result to a single card (a patient looking themselves up).
    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        restrict_to: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", query);

        let mut query_parts = vec![];

        if let Some(patient_id) = restrict_to {
            query_parts.push(format!("id=eq.{}", patient_id));
        }
        if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            query_parts.push(format!("name=ilike.*{}*", urlencoding::encode(name)));
        }
        if let Some(doctor_id) = query.personal_doctor_id {
            query_parts.push(format!("personal_doctor_id=eq.{}", doctor_id));
        }

        query_parts.push("order=name.asc".to_string());
        query_parts.push(format!("limit={}", query.limit.unwrap_or(50)));
        query_parts.push(format!("offset={}", query.offset.unwrap_or(0)));

        let path = format!("/rest/v1/patients?{}", query_parts.join("&"));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Patient>, _>>()?)
    }

    /// Removes a patient card that has no visits.
    pub async fn delete_patient(&self, patient_id: Uuid, auth_token: &str) -> Result<(), PatientError> {
        let path = format!("/rest/v1/visits?patient_id=eq.{}&select=id&limit=1", patient_id);
        let visits: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        if !visits.is_empty() {
            return Err(PatientError::Validation(
                "You cannot delete a patient who has visits.".to_string(),
            ));
        }

        let deleted: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &format!("/rest/v1/patients?id=eq.{}", patient_id),
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if deleted.is_empty() {
            return Err(PatientError::NotFound);
        }

        info!("Patient card {} deleted", patient_id);
        Ok(())
    }

    pub async fn ensure_doctor_exists(&self, doctor_id: Uuid, auth_token: &str) -> Result<(), PatientError> {
        let path = format!("/rest/v1/doctors?id=eq.{}&select=id", doctor_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        if rows.is_empty() {
            return Err(PatientError::DoctorNotFound);
        }
        Ok(())
    }

    async fn patch_patient(
        &self,
        patient_id: Uuid,
        data: Value,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(PatientError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }
}
