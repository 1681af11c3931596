//! Shared application state
//!
//! Este módulo define el estado compartido que se pasa a través del router
//! de Axum. Los repositorios se construyen una sola vez al arrancar.

use crate::config::environment::EnvironmentConfig;
use crate::repositories::Repositories;
use crate::utils::jwt::JwtConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub jwt: JwtConfig,
    pub repositories: Repositories,
}

impl AppState {
    pub fn new(config: EnvironmentConfig, repositories: Repositories) -> Self {
        Self {
            jwt: JwtConfig::from(&config),
            config,
            repositories,
        }
    }
}
