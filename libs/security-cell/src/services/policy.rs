// =====================================================================================
// ACCESS POLICY - ROLE x RESOURCE x OPERATION MATRIX
// =====================================================================================

use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{AccessError, Actor, Operation, Resource, Role};

pub struct AccessPolicy;

impl AccessPolicy {
    /// Whether `role` may perform `operation` on `resource` at all. Record-level
    /// restrictions are applied separately through `Actor::record_scope`.
    pub fn is_allowed(role: Role, resource: Resource, operation: Operation) -> bool {
        use Operation::*;
        use Resource::*;

        match role {
            Role::Admin => true,
            Role::Manager => operation == Read,
            Role::Doctor => match resource {
                Visit | Diagnosis => true,
                Patient => operation != Delete,
                Disease => operation != Delete,
                Doctor | Specialty => operation == Read,
            },
            Role::Intern => match resource {
                Visit | Diagnosis => operation != Delete,
                Patient | Doctor | Specialty | Disease => operation == Read,
            },
            Role::Patient => operation == Read,
        }
    }

    pub fn authorize(actor: &Actor, resource: Resource, operation: Operation) -> Result<(), AccessError> {
        if Self::is_allowed(actor.role, resource, operation) {
            debug!(user_id = %actor.user_id, role = %actor.role, "{} {} permitted", operation, resource);
            return Ok(());
        }

        warn!(
            user_id = %actor.user_id,
            role = %actor.role,
            operation = %operation,
            resource = %resource,
            "ACCESS DENIED"
        );
        Err(AccessError::Forbidden {
            role: actor.role,
            operation,
            resource,
        })
    }

    /// Role check followed by the record-scope check for a visit (or a diagnosis on it).
    pub fn authorize_visit(
        actor: &Actor,
        resource: Resource,
        operation: Operation,
        doctor_id: Uuid,
        patient_id: Uuid,
    ) -> Result<(), AccessError> {
        Self::authorize(actor, resource, operation)?;
        actor.record_scope().ensure_allows(doctor_id, patient_id).inspect_err(|_| {
            warn!(
                user_id = %actor.user_id,
                role = %actor.role,
                %doctor_id,
                %patient_id,
                "ACCESS DENIED: record outside scope"
            );
        })
    }

    pub fn authorize_patient(actor: &Actor, operation: Operation, patient_id: Uuid) -> Result<(), AccessError> {
        Self::authorize(actor, Resource::Patient, operation)?;
        if actor.can_see_patient(patient_id) {
            Ok(())
        } else {
            warn!(user_id = %actor.user_id, %patient_id, "ACCESS DENIED: foreign patient card");
            Err(AccessError::OutOfScope(format!("patient {} is not yours", patient_id)))
        }
    }

    /// Writes that bypass the completed-visit lock are reserved for administrators.
    pub fn authorize_lock_override(actor: &Actor) -> Result<(), AccessError> {
        if actor.role == Role::Admin {
            return Ok(());
        }

        warn!(user_id = %actor.user_id, role = %actor.role, "ACCESS DENIED: edit lock override");
        Err(AccessError::OutOfScope(
            "only administrators may change completed visits".to_string(),
        ))
    }
}
