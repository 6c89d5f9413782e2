use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    descendants, validate_disease_name, would_create_cycle, CreateDiseaseRequest, Disease,
    DiseaseEdge, DiseaseError, DiseaseWithChildren, UpdateDiseaseRequest,
};

pub struct DiseaseService {
    supabase: SupabaseClient,
}

impl DiseaseService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_disease(
        &self,
        request: CreateDiseaseRequest,
        auth_token: &str,
    ) -> Result<Disease, DiseaseError> {
        let name = validate_disease_name(&request.name)?;
        debug!("Creating disease {}", name);

        if let Some(parent_id) = request.parent_id {
            self.ensure_parent_exists(parent_id, auth_token).await?;
        }

        let data = json!({
            "name": name,
            "parent_id": request.parent_id,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/diseases",
            Some(auth_token),
            Some(data),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next()
            .ok_or_else(|| DiseaseError::Database("Failed to create disease".to_string()))?;
        let disease: Disease = serde_json::from_value(row)?;
        info!("Disease {} created with ID {}", disease.name, disease.id);

        Ok(disease)
    }

    pub async fn get_disease(&self, disease_id: Uuid, auth_token: &str) -> Result<Disease, DiseaseError> {
        let path = format!("/rest/v1/diseases?id=eq.{}", disease_id);
        let result: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;

        let row = result.into_iter().next().ok_or(DiseaseError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn get_diseases(&self, disease_ids: &[Uuid], auth_token: &str) -> Result<Vec<Disease>, DiseaseError> {
        if disease_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = disease_ids.iter().map(Uuid::to_string).collect();
        let path = format!("/rest/v1/diseases?id=in.({})", ids.join(","));
        let result: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Disease>, _>>()?)
    }

    pub async fn get_with_children(
        &self,
        disease_id: Uuid,
        auth_token: &str,
    ) -> Result<DiseaseWithChildren, DiseaseError> {
        let disease = self.get_disease(disease_id, auth_token).await?;
        let children = self.list_diseases(Some(disease_id), auth_token).await?;
        Ok(DiseaseWithChildren { disease, children })
    }

    /// All diseases, or the direct children of `parent_id`.
    pub async fn list_diseases(
        &self,
        parent_id: Option<Uuid>,
        auth_token: &str,
    ) -> Result<Vec<Disease>, DiseaseError> {
        let path = match parent_id {
            Some(parent_id) => format!("/rest/v1/diseases?parent_id=eq.{}&order=name.asc", parent_id),
            None => "/rest/v1/diseases?order=name.asc".to_string(),
        };

        let result: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Disease>, _>>()?)
    }

    pub async fn update_disease(
        &self,
        disease_id: Uuid,
        request: UpdateDiseaseRequest,
        auth_token: &str,
    ) -> Result<Disease, DiseaseError> {
        debug!("Updating disease: {}", disease_id);

        let mut update_data = serde_json::Map::new();

        if let Some(name) = &request.name {
            update_data.insert("name".to_string(), json!(validate_disease_name(name)?));
        }

        if request.clear_parent {
            update_data.insert("parent_id".to_string(), Value::Null);
        } else if let Some(parent_id) = request.parent_id {
            self.ensure_parent_exists(parent_id, auth_token).await?;
            let edges = self.load_edges(auth_token).await?;
            if would_create_cycle(disease_id, parent_id, &edges) {
                warn!("Rejected reparenting of disease {} under {}", disease_id, parent_id);
                return Err(DiseaseError::Cycle);
            }
            update_data.insert("parent_id".to_string(), json!(parent_id));
        }

        if update_data.is_empty() {
            return self.get_disease(disease_id, auth_token).await;
        }

        let path = format!("/rest/v1/diseases?id=eq.{}", disease_id);
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::representation_headers()),
        ).await?;

        let row = result.into_iter().next().ok_or(DiseaseError::NotFound)?;
        Ok(serde_json::from_value(row)?)
    }

    /// Deletes the disease with all of its sub-diseases.
    pub async fn delete_disease(&self, disease_id: Uuid, auth_token: &str) -> Result<Vec<Uuid>, DiseaseError> {
        let edges = self.load_edges(auth_token).await?;
        if !edges.iter().any(|edge| edge.id == disease_id) {
            return Err(DiseaseError::NotFound);
        }

        let subtree = descendants(disease_id, &edges);
        let ids: Vec<String> = subtree.iter().map(Uuid::to_string).collect();
        let id_list = ids.join(",");

        let path = format!("/rest/v1/diagnoses?disease_id=in.({})&select=id", id_list);
        let referencing: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        if !referencing.is_empty() {
            warn!("Disease {} subtree is used by {} diagnoses", disease_id, referencing.len());
            return Err(DiseaseError::InUse(referencing.len()));
        }

        let _: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &format!("/rest/v1/diseases?id=in.({})", id_list),
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        info!("Disease {} deleted with {} sub-diseases", disease_id, subtree.len() - 1);
        Ok(subtree)
    }

    async fn load_edges(&self, auth_token: &str) -> Result<Vec<DiseaseEdge>, DiseaseError> {
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            "/rest/v1/diseases?select=id,parent_id",
            Some(auth_token),
            None,
        ).await?;

        Ok(result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<DiseaseEdge>, _>>()?)
    }

    async fn ensure_parent_exists(&self, parent_id: Uuid, auth_token: &str) -> Result<(), DiseaseError> {
        match self.get_disease(parent_id, auth_token).await {
            Ok(_) => Ok(()),
            Err(DiseaseError::NotFound) => Err(DiseaseError::ParentNotFound),
            Err(e) => Err(e),
        }
    }
}
