use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::User;

use crate::models::{AccessError, Actor, Role};

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Uuid,
}

/// Links an authenticated account to its doctor or patient card.
pub struct ActorResolver {
    supabase: SupabaseClient,
}

impl ActorResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn resolve(&self, user: &User, auth_token: &str) -> Result<Actor, AccessError> {
        let role = Role::from_claim(user.role.as_deref())?;
        let mut actor = Actor::new(&user.id, role);

        match role {
            Role::Patient => {
                let path = format!("/rest/v1/patients?user_id=eq.{}&select=id&limit=1", user.id);
                actor.patient_id = self.first_id(&path, auth_token).await?;
            }
            Role::Intern | Role::Doctor => {
                let path = format!("/rest/v1/doctors?user_id=eq.{}&select=id&limit=1", user.id);
                actor.doctor_id = self.first_id(&path, auth_token).await?;

                if let (Role::Doctor, Some(doctor_id)) = (role, actor.doctor_id) {
                    let path = format!("/rest/v1/doctors?mentor_id=eq.{}&select=id", doctor_id);
                    actor.intern_ids = self.ids(&path, auth_token).await?;
                }
            }
            Role::Manager | Role::Admin => {}
        }

        debug!(
            "Resolved actor {} as {} (doctor: {:?}, patient: {:?}, interns: {})",
            actor.user_id, actor.role, actor.doctor_id, actor.patient_id, actor.intern_ids.len()
        );
        Ok(actor)
    }

    async fn ids(&self, path: &str, auth_token: &str) -> Result<Vec<Uuid>, AccessError> {
        let rows: Vec<IdRow> = self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AccessError::Lookup(e.to_string()))?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn first_id(&self, path: &str, auth_token: &str) -> Result<Option<Uuid>, AccessError> {
        Ok(self.ids(path, auth_token).await?.into_iter().next())
    }
}
