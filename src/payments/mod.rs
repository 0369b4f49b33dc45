//! # Pagos
//!
//! Integración con el proveedor de pagos externo:
//!
//! - [`client`] - Cliente HTTP del proveedor (preferencias y consulta de pagos)
//! - [`signature`] - Verificación de firmas HMAC de webhooks
//! - [`reconcile`] - Operación idempotente que marca publicidades como pagadas
//!
//! La confirmación de un pago puede llegar por dos caminos que compiten:
//! la verificación sincrónica que dispara el cliente y el webhook asincrónico
//! del proveedor. Ambos terminan en la misma operación de [`reconcile`], que
//! es convergente: el flag de pago solo pasa de false a true.

pub mod client;
pub mod reconcile;
pub mod signature;

pub use client::{ClientePagos, PagoProveedor};
pub use reconcile::{confirmar_pago_aprobado, ResultadoConfirmacion};
