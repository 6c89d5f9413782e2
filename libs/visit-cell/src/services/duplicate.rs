use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{Visit, VisitError};

/// Same doctor, same patient, same calendar day.
pub struct DuplicateVisitService {
    supabase: Arc<SupabaseClient>,
}

impl DuplicateVisitService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// `[midnight, next midnight)` around the date of `planned`.
    pub fn day_window(planned: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = planned.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
        (start, start + Duration::days(1))
    }

    pub fn is_same_day_duplicate(candidate: &Visit, other: &Visit) -> bool {
        if candidate.id == other.id
            || candidate.doctor_id != other.doctor_id
            || candidate.patient_id != other.patient_id
        {
            return false;
        }

        match (candidate.planned_datetime, other.planned_datetime) {
            (Some(planned), Some(other_planned)) => {
                let (start, end) = Self::day_window(planned);
                other_planned >= start && other_planned < end
            }
            _ => false,
        }
    }

    /// Fails when another visit collides with `candidate`. Visits without a planned time never collide.
    pub async fn ensure_no_duplicate(
        &self,
        candidate: &Visit,
        auth_token: &str,
    ) -> Result<(), VisitError> {
        let Some(planned) = candidate.planned_datetime else {
            return Ok(());
        };

        let (start, end) = Self::day_window(planned);
        debug!(
            "Checking same-day visits for doctor {} and patient {} between {} and {}",
            candidate.doctor_id, candidate.patient_id, start, end
        );

        let path = format!(
            "/rest/v1/visits?id=neq.{}&doctor_id=eq.{}&patient_id=eq.{}&planned_datetime=gte.{}&planned_datetime=lt.{}",
            candidate.id,
            candidate.doctor_id,
            candidate.patient_id,
            start.to_rfc3339_opts(SecondsFormat::Secs, true),
            end.to_rfc3339_opts(SecondsFormat::Secs, true),
        );

        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        let others = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Visit>, _>>()?;

        if let Some(existing) = others.iter().find(|other| Self::is_same_day_duplicate(candidate, other)) {
            warn!(
                "Visit {} duplicates visit {} on {}",
                candidate.id,
                existing.id,
                planned.date_naive()
            );
            return Err(VisitError::Duplicate);
        }

        Ok(())
    }
}
