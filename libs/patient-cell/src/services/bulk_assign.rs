use tracing::{info, warn};

use shared_config::AppConfig;

use crate::models::{BulkAssignDoctorRequest, BulkAssignDoctorResult, BulkAssignFailure, PatientError};
use crate::services::patient::PatientService;

/// Assigns one personal doctor to many patients.
pub struct BulkAssignService {
    patients: PatientService,
}

impl BulkAssignService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            patients: PatientService::new(config),
        }
    }

    /// Writes stop at the first failing patient. Earlier writes are not rolled back.
    pub async fn assign_doctor(
        &self,
        request: BulkAssignDoctorRequest,
        auth_token: &str,
    ) -> Result<BulkAssignDoctorResult, PatientError> {
        if request.patient_ids.is_empty() {
            return Err(PatientError::Validation("Select at least one patient".to_string()));
        }

        self.patients.ensure_doctor_exists(request.doctor_id, auth_token).await?;

        let mut result = BulkAssignDoctorResult {
            doctor_id: request.doctor_id,
            updated: Vec::with_capacity(request.patient_ids.len()),
            failed: None,
        };

        for patient_id in request.patient_ids {
            match self
                .patients
                .assign_personal_doctor(patient_id, request.doctor_id, auth_token)
                .await
            {
                Ok(_) => result.updated.push(patient_id),
                Err(e) => {
                    warn!("Bulk doctor assignment stopped at patient {}: {}", patient_id, e);
                    result.failed = Some(BulkAssignFailure {
                        patient_id,
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }

        info!(
            "Assigned doctor {} to {} patient(s)",
            result.doctor_id,
            result.updated.len()
        );
        Ok(result)
    }
}
