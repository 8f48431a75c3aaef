/// Configuration management for the API server
///
/// Configuration comes from environment variables, with a `.env` file loaded
/// first when present.
///
/// # Environment Variables
///
/// - `PORT` (falls back to `API_PORT`, default 8080) and `API_HOST` (default `0.0.0.0`)
/// - `DATABASE_URL` (required), `DATABASE_MAX_CONNECTIONS` (default 10)
/// - `SESSION_SECRET` (required, at least 32 characters; `JWT_SECRET` is accepted too)
/// - `CORS_ORIGINS`: comma-separated origins, `*` allows any (default `*`)
/// - `TRUST_PROXY`: take the client address from `X-Forwarded-For`
/// - `PRODUCTION`: enables HSTS
/// - `RUN_MIGRATIONS`: apply migrations at startup (default true)
/// - `RUST_LOG`, `LOG_FORMAT`: read by the logging setup in `main`
///
/// # Example
///
/// ```no_run
/// use orientation_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;

/// Minimum length of the token signing secret
pub const MIN_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,

    /// Trust `X-Forwarded-For` for the client address
    pub trust_proxy: bool,

    /// Production mode (HSTS header)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

/// Token signing configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 signing secret
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,
}

fn parse_bool(name: &str, value: Option<String>, default: bool) -> anyhow::Result<bool> {
    let Some(value) = value else {
        return Ok(default);
    };

    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("{} must be a boolean, got {:?}", name, other),
    }
}

fn parse_origins(value: Option<String>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };

    let origins: Vec<String> = value
        .split(',')
        .map(|origin| origin.trim().trim_end_matches('/').to_string())
        .filter(|origin| !origin.is_empty())
        .collect();

    if origins.iter().any(|origin| origin == "*") {
        return Vec::new();
    }

    origins
}

impl Config {
    /// Loads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("PORT")
            .or_else(|| lookup("API_PORT"))
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| anyhow::anyhow!("PORT must be a valid port number: {}", e))?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()
            .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS must be a number: {}", e))?;

        let secret = lookup("SESSION_SECRET")
            .or_else(|| lookup("JWT_SECRET"))
            .ok_or_else(|| anyhow::anyhow!("SESSION_SECRET environment variable is required"))?;

        if secret.len() < MIN_SECRET_LENGTH {
            anyhow::bail!(
                "SESSION_SECRET must be at least {} characters long",
                MIN_SECRET_LENGTH
            );
        }

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins: parse_origins(lookup("CORS_ORIGINS")),
                trust_proxy: parse_bool("TRUST_PROXY", lookup("TRUST_PROXY"), false)?,
                production: parse_bool("PRODUCTION", lookup("PRODUCTION"), false)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                run_migrations: parse_bool("RUN_MIGRATIONS", lookup("RUN_MIGRATIONS"), true)?,
            },
            jwt: JwtConfig { secret },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/orientation"),
            ("SESSION_SECRET", SECRET),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.database.max_connections, 10);
        assert!(config.database.run_migrations);
        assert!(config.api.cors_origins.is_empty());
        assert!(!config.api.trust_proxy);
        assert!(!config.api.production);
    }

    #[test]
    fn test_port_prefers_port_over_api_port() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/orientation"),
            ("SESSION_SECRET", SECRET),
            ("PORT", "3001"),
            ("API_PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.api.port, 3001);

        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/orientation"),
            ("SESSION_SECRET", SECRET),
            ("API_PORT", "9000"),
        ])
        .unwrap();
        assert_eq!(config.api.port, 9000);
    }

    #[test]
    fn test_jwt_secret_alias() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/orientation"),
            ("JWT_SECRET", SECRET),
        ])
        .unwrap();

        assert_eq!(config.jwt.secret, SECRET);
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgresql://localhost/orientation"),
            ("SESSION_SECRET", "too-short"),
        ])
        .unwrap_err();

        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_missing_database_url() {
        let err = load(&[("SESSION_SECRET", SECRET)]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_flags_and_origins() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://localhost/orientation"),
            ("SESSION_SECRET", SECRET),
            ("CORS_ORIGINS", "https://app.example.com/, http://localhost:5173"),
            ("TRUST_PROXY", "true"),
            ("PRODUCTION", "1"),
            ("RUN_MIGRATIONS", "false"),
        ])
        .unwrap();

        assert_eq!(
            config.api.cors_origins,
            vec!["https://app.example.com", "http://localhost:5173"]
        );
        assert!(config.api.trust_proxy);
        assert!(config.api.production);
        assert!(!config.database.run_migrations);
    }

    #[test]
    fn test_wildcard_origin_means_any() {
        assert!(parse_origins(Some("https://a.example.com,*".to_string())).is_empty());
    }

    #[test]
    fn test_invalid_bool() {
        assert!(parse_bool("TRUST_PROXY", Some("maybe".to_string()), false).is_err());
    }
}
