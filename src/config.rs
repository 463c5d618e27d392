use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub bucket_name: String,
    pub bucket_region: String,
    pub access_key: String,
    pub secret_access_key: String,
    pub client_url: String,
    pub signed_url_ttl: Duration,
    pub upstream_timeout: Duration,
    pub max_upload_bytes: usize,
    pub profanity_extra_words: Vec<String>,
}

// Secrets stay out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("server_port", &self.server_port)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("bucket_name", &self.bucket_name)
            .field("bucket_region", &self.bucket_region)
            .field("client_url", &self.client_url)
            .field("signed_url_ttl", &self.signed_url_ttl)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Error)]
#[error("invalid environment configuration: {}", .problems.join("; "))]
pub struct ConfigError {
    pub problems: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut reader = EnvReader {
            lookup,
            problems: Vec::new(),
        };

        let database_url = reader.required("DATABASE_URL");
        let jwt_secret = reader.required("JWT_SECRET");
        let bcrypt_cost = reader.required_parsed::<u32>("SALT");
        let server_port = reader.required_parsed::<u16>("SERVER_PORT");
        let bucket_name = reader.required("BUCKET_NAME");
        let bucket_region = reader.required("BUCKET_REGION");
        let access_key = reader.required("ACCESS_KEY");
        let secret_access_key = reader.required("SECRET_ACCESS_KEY");
        let client_url = reader.required("CLIENT_URL");
        let signed_url_ttl =
            reader.optional_parsed::<u64>("SIGNED_URL_TTL_SECS", DEFAULT_SIGNED_URL_TTL_SECS);
        let upstream_timeout =
            reader.optional_parsed::<u64>("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS);
        let max_upload_bytes =
            reader.optional_parsed::<usize>("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);
        let profanity_extra_words = (reader.lookup)("PROFANITY_EXTRA_WORDS")
            .map(|raw| {
                raw.split(',')
                    .map(|w| w.trim().to_lowercase())
                    .filter(|w| !w.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if let Some(cost) = bcrypt_cost {
            if !(4..=31).contains(&cost) {
                reader.problems.push("SALT must be a bcrypt cost between 4 and 31".to_string());
            }
        }
        for (key, value) in [
            ("SERVER_PORT", server_port.map(u64::from)),
            ("SIGNED_URL_TTL_SECS", signed_url_ttl),
            ("UPSTREAM_TIMEOUT_SECS", upstream_timeout),
            ("MAX_UPLOAD_BYTES", max_upload_bytes.map(|v| v as u64)),
        ] {
            if value == Some(0) {
                reader.problems.push(format!("{} must be positive", key));
            }
        }

        if !reader.problems.is_empty() {
            return Err(ConfigError {
                problems: reader.problems,
            });
        }

        // Every value below was checked above.
        Ok(Self {
            server_port: server_port.unwrap_or_default(),
            database_url: database_url.unwrap_or_default(),
            jwt_secret: jwt_secret.unwrap_or_default(),
            bcrypt_cost: bcrypt_cost.unwrap_or_default(),
            bucket_name: bucket_name.unwrap_or_default(),
            bucket_region: bucket_region.unwrap_or_default(),
            access_key: access_key.unwrap_or_default(),
            secret_access_key: secret_access_key.unwrap_or_default(),
            client_url: client_url.unwrap_or_default(),
            signed_url_ttl: Duration::from_secs(signed_url_ttl.unwrap_or_default()),
            upstream_timeout: Duration::from_secs(upstream_timeout.unwrap_or_default()),
            max_upload_bytes: max_upload_bytes.unwrap_or_default(),
            profanity_extra_words,
        })
    }

    pub fn is_sqlite(&self) -> bool {
        self.database_url.starts_with("sqlite:")
    }
}

struct EnvReader<F> {
    lookup: F,
    problems: Vec<String>,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&mut self, key: &str) -> Option<String> {
        match (self.lookup)(key).map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.problems.push(format!("{} is required", key));
                None
            }
        }
    }

    fn required_parsed<T: FromStr>(&mut self, key: &str) -> Option<T> {
        let raw = self.required(key)?;
        self.parse(key, &raw)
    }

    fn optional_parsed<T: FromStr>(&mut self, key: &str, default: T) -> Option<T> {
        match (self.lookup)(key).map(|v| v.trim().to_string()) {
            Some(raw) if !raw.is_empty() => self.parse(key, &raw),
            _ => Some(default),
        }
    }

    fn parse<T: FromStr>(&mut self, key: &str, raw: &str) -> Option<T> {
        match raw.parse::<T>() {
            Ok(v) => Some(v),
            Err(_) => {
                self.problems.push(format!("{} has an invalid value", key));
                None
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        server_port: 8080,
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        bcrypt_cost: 4,
        bucket_name: "bucket".to_string(),
        bucket_region: "eu-west-1".to_string(),
        access_key: "key".to_string(),
        secret_access_key: "secret".to_string(),
        client_url: "http://localhost:5173".to_string(),
        signed_url_ttl: Duration::from_secs(DEFAULT_SIGNED_URL_TTL_SECS),
        upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        max_upload_bytes: 1024 * 1024,
        profanity_extra_words: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "sqlite::memory:"),
            ("JWT_SECRET", "s3cret"),
            ("SALT", "10"),
            ("SERVER_PORT", "3000"),
            ("BUCKET_NAME", "chirp"),
            ("BUCKET_REGION", "eu-central-1"),
            ("ACCESS_KEY", "AKIA"),
            ("SECRET_ACCESS_KEY", "shh"),
            ("CLIENT_URL", "http://localhost:5173"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn loads_required_values_and_defaults() {
        let config = load(&full_env()).unwrap();
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.bcrypt_cost, 10);
        assert_eq!(config.signed_url_ttl, Duration::from_secs(3600));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.is_sqlite());
        assert!(config.profanity_extra_words.is_empty());
    }

    #[test]
    fn reports_every_missing_or_invalid_variable() {
        let mut env = full_env();
        env.remove("JWT_SECRET");
        env.insert("SALT", "99");
        env.insert("SERVER_PORT", "not-a-port");

        let err = load(&env).unwrap_err();
        assert_eq!(err.problems.len(), 3);
        assert!(err.to_string().contains("JWT_SECRET is required"));
        assert!(err.to_string().contains("SALT"));
        assert!(err.to_string().contains("SERVER_PORT has an invalid value"));
    }

    #[test]
    fn parses_extra_profanity_words() {
        let mut env = full_env();
        env.insert("PROFANITY_EXTRA_WORDS", " Heck, darn ,,");
        let config = load(&env).unwrap();
        assert_eq!(config.profanity_extra_words, vec!["heck", "darn"]);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = load(&full_env()).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("s3cret"));
        assert!(!printed.contains("shh"));
    }
}
