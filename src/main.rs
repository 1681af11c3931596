use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use workshop_api::config::{DatabaseConfig, EnvironmentConfig};
use workshop_api::create_app;
use workshop_api::database::DatabaseConnection;
use workshop_api::repositories::Repositories;
use workshop_api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging (RUST_LOG tiene prioridad)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    info!("🔧 Workshop API");
    info!("================================================");

    let config = EnvironmentConfig::from_env()?;
    let database_config = DatabaseConfig::from_env()?;

    // Inicializar base de datos
    let db_connection = match DatabaseConnection::connect(&database_config).await {
        Ok(conn) => conn,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };
    db_connection.run_migrations().await?;

    let repositories = Repositories::postgres(db_connection.pool().clone());
    let state = AppState::new(config.clone(), repositories);
    let app = create_app(state);

    let addr = config.server_url();
    info!("🌐 Servidor iniciando en http://{} ({})", addr, config.environment);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  / - Health check");
    info!("🧾 Órdenes de servicio:");
    info!("   POST   /service_orders - Crear o actualizar orden completa");
    info!("   GET    /service_orders - Listar órdenes");
    info!("   GET    /service_orders/:id - Orden con items, cliente y vehículo");
    info!("   DELETE /service_orders/:id - Eliminar orden");
    info!("   GET    /service_order_items/:id - Obtener item");
    info!("   DELETE /service_order_items/:id - Eliminar item");
    info!("📚 Recursos (list, search, get, delete):");
    info!("   /customers /vehicles /catalog /employees /suppliers");
    if config.is_development() && config.cors_origins.is_empty() {
        warn!("⚠️ CORS abierto: CORS_ORIGINS no configurado");
    }

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
        return Err(e.into());
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
