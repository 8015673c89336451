use std::time::Duration;

/// NCBI's guidance for unkeyed E-utilities clients is under 3 requests/s.
pub const DEFAULT_DELAY_SECS: f64 = 0.35;

const DEFAULT_EMAIL: &str = "assembly-atlas@users.noreply.github.com";

#[derive(Debug, Clone)]
pub struct EntrezCredentials {
    pub email: String,
    pub api_key: Option<String>,
}

impl EntrezCredentials {
    pub fn resolve(email_override: Option<&str>) -> Self {
        Self::from_parts(
            email_override,
            std::env::var("ENTREZ_EMAIL").ok().as_deref(),
            std::env::var("NCBI_API_KEY").ok().as_deref(),
        )
    }

    fn from_parts(
        email_override: Option<&str>,
        env_email: Option<&str>,
        env_key: Option<&str>,
    ) -> Self {
        let email = email_override
            .or(env_email)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_EMAIL)
            .to_string();
        let api_key = env_key
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Self { email, api_key }
    }
}

pub fn delay_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}
