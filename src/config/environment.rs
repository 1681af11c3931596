//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno. Las variables se leen a
//! través de una función de búsqueda para poder probarlas sin tocar `std::env`.

use anyhow::{anyhow, Context, Result};
use std::env;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub cors_origins: Vec<String>,
}

impl EnvironmentConfig {
    /// Leer la configuración desde las variables de entorno del proceso
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Leer la configuración desde una función de búsqueda arbitraria
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("JWT_SECRET must be set"))?;

        let port = match lookup("PORT") {
            Some(value) => value
                .parse()
                .with_context(|| format!("PORT must be a valid number, got '{}'", value))?,
            None => 8080,
        };

        let jwt_expiration = match lookup("JWT_EXPIRATION") {
            Some(value) => value
                .parse()
                .with_context(|| format!("JWT_EXPIRATION must be a valid number, got '{}'", value))?,
            None => 86_400,
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            port,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            jwt_secret,
            jwt_expiration,
            cors_origins,
        })
    }

    /// Configuración de desarrollo con un secreto dado
    pub fn development(jwt_secret: impl Into<String>) -> Self {
        Self {
            environment: "development".to_string(),
            port: 8080,
            host: "127.0.0.1".to_string(),
            jwt_secret: jwt_secret.into(),
            jwt_expiration: 3600,
            cors_origins: Vec::new(),
        }
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EnvironmentConfig::from_lookup(lookup_from(&[("JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.jwt_expiration, 86_400);
        assert!(config.is_development());
        assert!(config.cors_origins.is_empty());
        assert_eq!(config.server_url(), "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        assert!(EnvironmentConfig::from_lookup(lookup_from(&[])).is_err());
        assert!(EnvironmentConfig::from_lookup(lookup_from(&[("JWT_SECRET", "  ")])).is_err());
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let result = EnvironmentConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("PORT", "eighty"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_cors_origins_are_split() {
        let config = EnvironmentConfig::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s3cret"),
            ("ENVIRONMENT", "production"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
        ]))
        .unwrap();
        assert!(!config.is_development());
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
