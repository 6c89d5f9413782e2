use std::env;
use tracing::warn;

pub const DEFAULT_COMPANY_NAME: &str = "HR Hospital";
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub company_name: String,
    pub bind_address: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            company_name: env::var("HOSPITAL_COMPANY_NAME")
                .unwrap_or_else(|_| {
                    warn!("HOSPITAL_COMPANY_NAME not set, using default");
                    DEFAULT_COMPANY_NAME.to_string()
                }),
            bind_address: env::var("API_BIND_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    /// Configuration pointing at an explicit Supabase instance, used by tests and tools.
    pub fn for_supabase(url: &str, anon_key: &str, jwt_secret: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            supabase_anon_key: anon_key.to_string(),
            supabase_jwt_secret: jwt_secret.to_string(),
            company_name: DEFAULT_COMPANY_NAME.to_string(),
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_supabase_defaults() {
        let config = AppConfig::for_supabase("http://localhost:54321", "anon", "secret");

        assert!(config.is_configured());
        assert_eq!(config.company_name, DEFAULT_COMPANY_NAME);
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
    }

    #[test]
    fn test_missing_secret_is_not_configured() {
        let config = AppConfig::for_supabase("http://localhost:54321", "anon", "");
        assert!(!config.is_configured());
    }
}
