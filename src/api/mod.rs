//! # Módulo API
//!
//! Este módulo contiene todas las rutas y controladores de la API REST.
//!
//! ## Módulos principales
//!
//! - [`user`] - Usuarios: registro/inicio de sesión con Google, CRUD, bajas
//! - [`shop`] - Comercios: alta con validación de CUIT, moderación, cascadas
//! - [`reservation`] - Reservas: máquina de estados de aprobación
//! - [`review`] - Reseñas: elegibilidad atada a reservas aprobadas
//! - [`advertising`] - Publicidades: moderación + flag de pago
//! - [`payment`] - Pagos: preferencias, verificación sincrónica y webhook
//! - [`catalog`] - Catálogos de solo lectura (roles, tipos de comercio)
//! - [`errors`] - Manejo de errores de la aplicación

pub mod advertising;
pub mod catalog;
pub mod errors;
pub mod payment;
pub mod reservation;
pub mod review;
pub mod shop;
pub mod user;
mod middleware;

// Re-exportar tipos comunes para facilitar su uso
pub use errors::{AppError, AppResult, ErrorResponse, ResultExt};
pub use middleware::ErrorLogExt;

use actix_web::web;

/// Configura todas las rutas de la API
///
/// # Rutas configuradas
///
/// - `/usuarios/*` - Ver [`user::routes`]
/// - `/comercios/*` - Ver [`shop::routes`]
/// - `/reservas/*` - Ver [`reservation::routes`]
/// - `/resenias/*` - Ver [`review::routes`]
/// - `/publicidades/*` - Ver [`advertising::routes`]
/// - `/pagos/*` - Ver [`payment::routes`]
/// - `/tipos-comercio/*` y `/roles-usuario/*` - Ver [`catalog::routes`]
pub fn init_routes(cfg: &mut web::ServiceConfig) {
    user::routes(cfg);
    shop::routes(cfg);
    reservation::routes(cfg);
    review::routes(cfg);
    advertising::routes(cfg);
    payment::routes(cfg);
    catalog::routes(cfg);
}
