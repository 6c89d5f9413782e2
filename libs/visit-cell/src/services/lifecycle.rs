use tracing::{debug, warn};

use crate::models::{VisitError, VisitField, VisitStatus, WriteOptions};

/// Fields frozen once a visit is done.
pub const LOCKED_FIELDS: [VisitField; 3] = [
    VisitField::ActualDatetime,
    VisitField::DoctorId,
    VisitField::Status,
];

pub struct VisitLifecycleService;

impl Default for VisitLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl VisitLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Rejects a write touching a locked field when the visit is done before or
    /// after the write. `before` is `None` while creating.
    pub fn check_edit_lock(
        &self,
        before: Option<VisitStatus>,
        after: VisitStatus,
        changed: &[VisitField],
        options: WriteOptions,
    ) -> Result<(), VisitError> {
        if options.skip_edit_check {
            debug!("Edit check skipped for this write");
            return Ok(());
        }

        let touches_locked = changed.iter().any(|field| LOCKED_FIELDS.contains(field));
        if !touches_locked {
            return Ok(());
        }

        if before == Some(VisitStatus::Done) || after == VisitStatus::Done {
            warn!("Rejected write to completed visit (fields: {:?})", changed);
            return Err(VisitError::EditLocked);
        }

        Ok(())
    }

    /// Fields written by a create request; every column counts as changed.
    pub fn fields_on_create() -> Vec<VisitField> {
        vec![
            VisitField::DoctorId,
            VisitField::PatientId,
            VisitField::Status,
            VisitField::PlannedDatetime,
            VisitField::ActualDatetime,
            VisitField::Notes,
        ]
    }

    pub fn needs_duplicate_check(changed: &[VisitField]) -> bool {
        changed.iter().any(|field| {
            matches!(
                field,
                VisitField::DoctorId | VisitField::PatientId | VisitField::PlannedDatetime
            )
        })
    }
}
