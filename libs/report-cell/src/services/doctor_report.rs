use chrono::Utc;
use tracing::{debug, info};

use diagnosis_cell::services::DiagnosisService;
use doctor_cell::services::DoctorService;
use security_cell::RecordScope;
use shared_config::AppConfig;
use visit_cell::services::VisitService;

use crate::models::{
    latest_visit_per_patient, DoctorReport, DoctorReportEntry, DoctorReportRequest, LatestVisit,
    ReportError,
};

pub struct DoctorReportService {
    doctors: DoctorService,
    visits: VisitService,
    diagnoses: DiagnosisService,
    company: String,
}

impl DoctorReportService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            doctors: DoctorService::new(config),
            visits: VisitService::new(config),
            diagnoses: DiagnosisService::new(config),
            company: config.company_name.clone(),
        }
    }

    /// Report context for the requested doctors, in request order. Only visits inside
    /// `scope` are considered.
    pub async fn build(
        &self,
        request: DoctorReportRequest,
        scope: &RecordScope,
        auth_token: &str,
    ) -> Result<DoctorReport, ReportError> {
        if request.doctor_ids.is_empty() {
            return Err(ReportError::Validation("Select at least one doctor".to_string()));
        }
        debug!("Building doctor report for {} doctor(s)", request.doctor_ids.len());

        let doctors = self.doctors.get_doctors(&request.doctor_ids, auth_token).await?;
        let visits: Vec<_> = self
            .visits
            .list_for_doctors(&request.doctor_ids, auth_token)
            .await?
            .into_iter()
            .filter(|visit| scope.allows(visit.doctor_id, visit.patient_id))
            .collect();

        let mut docs = Vec::with_capacity(request.doctor_ids.len());
        for doctor_id in &request.doctor_ids {
            let doctor = doctors
                .iter()
                .find(|doctor| doctor.id == *doctor_id)
                .cloned()
                .ok_or(ReportError::DoctorNotFound(*doctor_id))?;

            let own_visits: Vec<_> = visits
                .iter()
                .filter(|visit| visit.doctor_id == *doctor_id)
                .cloned()
                .collect();
            let visit_count: u32 = own_visits.iter().map(|visit| visit.visit_count()).sum();

            let latest = latest_visit_per_patient(&own_visits);
            let latest_ids: Vec<_> = latest.iter().map(|visit| visit.id).collect();
            let diagnoses = self.diagnoses.list_for_visits(&latest_ids, auth_token).await?;

            let latest_visits = latest
                .into_iter()
                .map(|visit| LatestVisit {
                    patient_id: visit.patient_id,
                    diagnoses: diagnoses
                        .iter()
                        .filter(|diagnosis| diagnosis.visit_id == visit.id)
                        .map(|diagnosis| diagnosis.view())
                        .collect(),
                    visit: visit.clone(),
                })
                .collect();

            docs.push(DoctorReportEntry { doctor, visit_count, latest_visits });
        }

        info!("Doctor report built for {} doctor(s)", docs.len());
        Ok(DoctorReport {
            doc_ids: request.doctor_ids,
            docs,
            company: self.company.clone(),
            now: Utc::now().format("%Y-%m-%d %H:%M").to_string(),
        })
    }
}
