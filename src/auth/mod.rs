//! # Autenticación
//!
//! - [`session`] - Emisión y validación de credenciales de sesión propias (JWT)
//! - [`google`] - Verificación de id_tokens de Google (caja negra externa)

pub mod google;
pub mod session;

pub use google::ClienteIdentidad;
pub use session::{autorizar, autorizar_administrador};
