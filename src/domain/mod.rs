//! # Módulo de dominio
//!
//! Reglas de negocio puras, separadas de los handlers HTTP para que las
//! propiedades del flujo de aprobación se puedan testear sin base de datos.
//!
//! - [`approval`] - Estado de aprobación tri-estado (pendiente/aprobada/rechazada)
//! - [`rules`] - Reglas de conflicto de reservas y elegibilidad de reseñas
//! - [`cuit`] - Validación del dígito verificador de CUIT
//! - [`images`] - Detección de tipo de imagen por magic bytes

pub mod approval;
pub mod cuit;
pub mod images;
pub mod rules;

pub use approval::EstadoAprobacion;
