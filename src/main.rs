//! # Salidas API
//!
//! Backend del marketplace de salidas construido con Rust, Actix Web y
//! MongoDB: comercios, reservas, reseñas y publicidades pagas.
//!
//! ## Características principales
//!
//! - **Comercios**: alta con validación de CUIT, moderación y búsquedas
//! - **Reservas**: máquina de estados pendiente/aprobada/rechazada con
//!   detección de conflictos por usuario, comercio y fecha
//! - **Reseñas**: solo habilitadas tras una reserva aprobada, con
//!   moderación y reintento único tras rechazo
//! - **Publicidades**: moderación + pago, conciliado contra el proveedor
//!   por verificación sincrónica y webhook firmado
//! - **Sesiones**: identidad verificada con Google, credencial propia JWT
//!
//! ## Configuración
//!
//! El servidor se configura mediante variables de entorno (archivo `.env`):
//!
//! ```env
//! # Base de datos MongoDB
//! MONGODB_URI=mongodb://localhost:27017
//! MONGODB_DATABASE=salidas
//!
//! # Servidor
//! BIND_ADDRESS=0.0.0.0:8080
//! CORS_ORIGENES=http://localhost:3000
//!
//! # Sesiones
//! JWT_SECRETO=cambiar-en-produccion
//!
//! # Proveedor de pagos
//! MP_ACCESS_TOKEN=...
//! MP_WEBHOOK_SECRET=...   # opcional: sin él no se verifica la firma
//!
//! # Logging
//! RUST_LOG=debug,mongodb=info
//! ```
//!
//! ## Ejecución
//!
//! ```bash
//! # 1. Instalar y ejecutar MongoDB
//! # Local: mongod
//! # Docker: docker run -d --name mongo -p 27017:27017 mongo:latest
//!
//! # 2. Configurar variables de entorno
//! cp .env.example .env
//!
//! # 3. Compilar y ejecutar
//! cargo run
//! ```
//!
//! ## Arquitectura
//!
//! ```text
//! Clientes (web / app)          Proveedor de pagos
//!     ↓ HTTP/JSON                  ↓ webhook firmado
//! API REST (Actix Web) ←──────────┘
//!     ↓ MongoDB Driver
//! MongoDB Database
//! ```

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};

mod api;
mod auth;
mod config;
mod db;
mod domain;
mod payments;

use auth::ClienteIdentidad;
use config::Configuracion;
use payments::ClientePagos;

/// Función principal que inicia el servidor web
///
/// # Funcionalidad
///
/// 1. Carga variables de entorno desde `.env`
/// 2. Configura el sistema de logging con tracing
/// 3. Establece conexión con MongoDB y crea índices
/// 4. Inicializa los catálogos (roles, tipos de comercio) si están vacíos
/// 5. Construye los clientes de identidad y de pagos
/// 6. Configura el servidor HTTP con CORS, logging y rutas
///
/// # Errores
///
/// Retorna `std::io::Error` si no se puede conectar a MongoDB, construir
/// los clientes externos o bindear el puerto.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    // Configurar sistema de logging con tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("salidas_api=debug".parse().unwrap())
                .add_directive("mongodb=info".parse().unwrap()),
        )
        .init();

    tracing::info!("Iniciando Salidas API...");

    let configuracion = Configuracion::desde_entorno();

    // Inicializar conexión a MongoDB
    let mongo_repo = match db::MongoRepo::init(&configuracion).await {
        Ok(repo) => {
            // Intentar crear índices para optimizar consultas
            if let Err(e) = repo.create_indexes().await {
                tracing::warn!("Advertencia creando índices: {}", e);
                // No es un error fatal, continuamos sin índices
            }

            if let Err(e) = repo.seed_catalogos().await {
                tracing::warn!("Advertencia inicializando catálogos: {}", e);
            }

            repo
        }
        Err(e) => {
            tracing::error!("Error conectando a MongoDB: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Error de MongoDB: {}", e),
            ));
        }
    };

    let cliente_identidad = ClienteIdentidad::new(configuracion.google_client_ids.clone());

    let cliente_pagos = ClientePagos::new(&configuracion.pagos).map_err(|e| {
        std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Error creando cliente de pagos: {}", e),
        )
    })?;

    let bind_address = configuracion.bind_address.clone();
    tracing::info!("Servidor iniciando en {}", bind_address);

    // Crear y configurar el servidor HTTP
    HttpServer::new(move || {
        // Sin orígenes configurados se permite cualquiera (solo desarrollo)
        let mut cors = if configuracion.cors_origenes.is_empty() {
            Cors::permissive()
        } else {
            Cors::default()
                .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
                .allow_any_header()
                .max_age(3600)
        };

        for origen in &configuracion.cors_origenes {
            cors = cors.allowed_origin(origen);
        }

        App::new()
            .app_data(web::Data::new(mongo_repo.clone()))
            .app_data(web::Data::new(configuracion.clone()))
            .app_data(web::Data::new(cliente_identidad.clone()))
            .app_data(web::Data::new(cliente_pagos.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .configure(api::init_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
