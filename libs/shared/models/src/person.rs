// Personal details shared by doctors and patients. The fields are stored as
// columns on both the `doctors` and `patients` tables.
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9 ()\-]{5,20}$").expect("phone pattern is valid")
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Male => write!(f, "male"),
            Gender::Female => write!(f, "female"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonDetails {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub photo_url: Option<String>,
    pub gender: Option<Gender>,
    /// Linked auth account, cleared when the account goes away.
    pub user_id: Option<Uuid>,
}

impl PersonDetails {
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_name_part("First name", &self.first_name)?;
        validate_name_part("Last name", &self.last_name)?;
        if let Some(phone) = &self.phone {
            validate_phone(phone)?;
        }
        Ok(())
    }
}

/// `"{first} {last}"` with surrounding whitespace removed; either part may be empty.
pub fn full_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name, last_name).trim().to_string()
}

pub fn validate_name_part(label: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), String> {
    if !PHONE_PATTERN.is_match(phone) {
        return Err(format!("Invalid phone number: {}", phone));
    }
    Ok(())
}
