use serde::Deserialize;

use crate::nutrition::accumulator::{validate_limit, DEFAULT_DAILY_LIMIT};

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub gemini: GeminiConfig,
    /// Budget every new session starts with.
    pub daily_limit: u32,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            var(key).ok_or_else(|| anyhow::anyhow!("missing environment variable {key}"))
        };

        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "nutrivision".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "nutrivision-users".into()),
            ttl_minutes: var("JWT_TTL_MINUTES")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: var("JWT_REFRESH_TTL_MINUTES")
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let gemini = GeminiConfig {
            api_key: required("GOOGLE_API_KEY")?,
            model: var("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.5-flash".into()),
            base_url: var("GEMINI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".into()),
            timeout_secs: var("GEMINI_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60),
        };
        let daily_limit = match var("DAILY_CALORIE_LIMIT") {
            Some(v) => {
                let limit = v
                    .parse::<u32>()
                    .map_err(|e| anyhow::anyhow!("DAILY_CALORIE_LIMIT: {e}"))?;
                validate_limit(limit)?
            }
            None => DEFAULT_DAILY_LIMIT,
        };

        Ok(Self {
            database_url,
            jwt,
            gemini,
            daily_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/nutrivision"),
        ("JWT_SECRET", "s3cret"),
        ("GOOGLE_API_KEY", "key"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(cfg.daily_limit, 2000);
        assert_eq!(cfg.jwt.issuer, "nutrivision");
        assert_eq!(cfg.jwt.ttl_minutes, 60);
        assert_eq!(cfg.gemini.model, "gemini-2.5-flash");
        assert_eq!(cfg.gemini.timeout_secs, 60);
    }

    #[test]
    fn daily_limit_is_read_and_validated() {
        let mut vars = BASE.to_vec();
        vars.push(("DAILY_CALORIE_LIMIT", "2500"));
        assert_eq!(AppConfig::from_lookup(lookup(&vars)).unwrap().daily_limit, 2500);

        vars.pop();
        vars.push(("DAILY_CALORIE_LIMIT", "500"));
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());

        vars.pop();
        vars.push(("DAILY_CALORIE_LIMIT", "lots"));
        assert!(AppConfig::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let vars = &BASE[..2];
        let err = AppConfig::from_lookup(lookup(vars)).unwrap_err();
        assert!(err.to_string().contains("GOOGLE_API_KEY"));
    }
}
