use std::collections::HashMap;

use tracing::{debug, info};
use uuid::Uuid;

use diagnosis_cell::services::{DiagnosisService, DiseaseService};
use security_cell::RecordScope;
use shared_config::AppConfig;

use crate::models::{group_by_disease, DiagnosisReport, DiagnosisReportRequest, ReportError};

/// Runs the diagnosis report filter.
pub struct DiagnosisReportService {
    diagnoses: DiagnosisService,
    diseases: DiseaseService,
}

impl DiagnosisReportService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            diagnoses: DiagnosisService::new(config),
            diseases: DiseaseService::new(config),
        }
    }

    /// Matching diagnoses the caller may see, grouped by disease.
    pub async fn run(
        &self,
        request: DiagnosisReportRequest,
        scope: &RecordScope,
        auth_token: &str,
    ) -> Result<DiagnosisReport, ReportError> {
        request.validate()?;
        let action = request.to_action();

        if scope.is_nothing() {
            return Ok(DiagnosisReport { action, groups: Vec::new(), total: 0 });
        }

        let mut filters = action
            .domain
            .iter()
            .map(|clause| clause.to_query_param())
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(filter) = scope.filter_params("visit.") {
            filters.push(filter);
        }
        debug!("Diagnosis report filters: {:?}", filters);

        let diagnoses = self.diagnoses.list_matching(&filters, auth_token).await?;
        let views: Vec<_> = diagnoses.iter().map(|diagnosis| diagnosis.view()).collect();

        let mut disease_ids: Vec<Uuid> = views.iter().map(|view| view.disease_id).collect();
        disease_ids.sort();
        disease_ids.dedup();
        let names: HashMap<Uuid, String> = self
            .diseases
            .get_diseases(&disease_ids, auth_token)
            .await?
            .into_iter()
            .map(|disease| (disease.id, disease.name))
            .collect();

        let total = views.len();
        let groups = group_by_disease(views, &names);
        info!("Diagnosis report: {} diagnoses in {} disease group(s)", total, groups.len());

        Ok(DiagnosisReport { action, groups, total })
    }
}
