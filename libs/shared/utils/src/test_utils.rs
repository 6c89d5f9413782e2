use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    /// Points the configuration at a mock server.
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig::for_supabase(&self.supabase_url, &self.supabase_anon_key, &self.jwt_secret)
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn intern(email: &str) -> Self {
        Self::new(email, "intern")
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn manager(email: &str) -> Self {
        Self::new(email, "manager")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for the hospital tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn doctor_row(
        doctor_id: &str,
        first_name: &str,
        last_name: &str,
        is_intern: bool,
        mentor_id: Option<&str>,
    ) -> Value {
        json!({
            "id": doctor_id,
            "first_name": first_name,
            "last_name": last_name,
            "name": format!("{} {}", first_name, last_name).trim(),
            "phone": null,
            "photo_url": null,
            "gender": null,
            "user_id": null,
            "specialty_id": null,
            "is_intern": is_intern,
            "mentor_id": mentor_id,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn patient_row(patient_id: &str, first_name: &str, last_name: &str) -> Value {
        json!({
            "id": patient_id,
            "first_name": first_name,
            "last_name": last_name,
            "name": format!("{} {}", first_name, last_name).trim(),
            "phone": null,
            "photo_url": null,
            "gender": null,
            "user_id": null,
            "personal_doctor_id": null,
            "birth_date": null,
            "passport_data": null,
            "contact_person": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn visit_row(
        visit_id: &str,
        doctor_id: &str,
        patient_id: &str,
        status: &str,
        planned_datetime: &str,
    ) -> Value {
        json!({
            "id": visit_id,
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "status": status,
            "planned_datetime": planned_datetime,
            "actual_datetime": null,
            "notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn diagnosis_row(
        diagnosis_id: &str,
        visit_id: &str,
        disease_id: &str,
        approved: bool,
    ) -> Value {
        json!({
            "id": diagnosis_id,
            "visit_id": visit_id,
            "disease_id": disease_id,
            "description": null,
            "approved": approved,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn disease_row(disease_id: &str, name: &str, parent_id: Option<&str>) -> Value {
        json!({
            "id": disease_id,
            "name": name,
            "parent_id": parent_id,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn specialty_row(specialty_id: &str, name: &str) -> Value {
        json!({
            "id": specialty_id,
            "name": name,
            "translations": {},
            "created_at": "2024-01-01T00:00:00Z"
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::intern("intern@example.com");
        assert_eq!(user.role, "intern");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(user.role.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_doctor_row_name_is_trimmed() {
        let row = MockSupabaseResponses::doctor_row("d1", "Alice", "", false, None);
        assert_eq!(row["name"], "Alice");
    }
}
