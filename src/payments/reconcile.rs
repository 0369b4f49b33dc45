//! # Conciliación de pagos
//!
//! Única operación que marca una publicidad como pagada. La invocan dos
//! caminos que pueden correr a la vez sobre el mismo pago: la verificación
//! sincrónica (`POST /pagos/verificar-pago`) y el webhook del proveedor.
//!
//! La operación es idempotente y convergente: el filtro condicional
//! `{_id, pago: false}` hace que solo una de las dos escrituras gane y que
//! reprocesar un pago ya confirmado sea un no-op, nunca un error.

use mongodb::bson::{doc, oid::ObjectId};

use crate::api::{AppError, AppResult};
use crate::db::MongoRepo;
use crate::payments::client::PagoProveedor;

/// Resultado de intentar confirmar un pago sobre la publicidad
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultadoConfirmacion {
    /// El pago estaba aprobado y la publicidad se marcó ahora
    Marcada(ObjectId),
    /// La publicidad ya figuraba pagada (reintento o carrera perdida)
    YaPagada(ObjectId),
    /// El proveedor no informa el pago como aprobado
    NoAprobado,
    /// La referencia externa falta o no es un id de publicidad
    ReferenciaInvalida,
    /// La referencia apunta a una publicidad que no existe
    PublicidadInexistente(ObjectId),
}

/// Decisión pura previa a tocar la base: qué corresponde hacer con el flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionMarcado {
    Marcar,
    NoOp,
    Ignorar,
}

/// El flag de pago es monótono: solo se marca cuando el proveedor informa
/// `approved`, y si ya estaba marcado no hay nada que hacer.
pub fn decidir_marcado(status: &str, ya_pagada: bool) -> DecisionMarcado {
    if status != "approved" {
        return DecisionMarcado::Ignorar;
    }
    if ya_pagada {
        return DecisionMarcado::NoOp;
    }
    DecisionMarcado::Marcar
}

/// Marca la publicidad referida por el pago como pagada, si corresponde.
///
/// Nunca devuelve error por reprocesamiento: la distinción entre "recién
/// marcada" y "ya estaba pagada" queda en el resultado para que cada caller
/// responda lo suyo.
pub async fn confirmar_pago_aprobado(
    repo: &MongoRepo,
    pago: &PagoProveedor,
) -> AppResult<ResultadoConfirmacion> {
    if pago.status != "approved" {
        return Ok(ResultadoConfirmacion::NoAprobado);
    }

    let referencia = match pago.external_reference.as_deref() {
        Some(r) if !r.is_empty() => r,
        _ => return Ok(ResultadoConfirmacion::ReferenciaInvalida),
    };

    let id_publicidad = match ObjectId::parse_str(referencia) {
        Ok(id) => id,
        Err(_) => return Ok(ResultadoConfirmacion::ReferenciaInvalida),
    };

    let publicidades = repo.publicidades();

    let actual = publicidades
        .find_one(doc! { "_id": id_publicidad })
        .await
        .map_err(|e| AppError::database("confirmar_pago_busqueda", e))?;

    let actual = match actual {
        Some(p) => p,
        None => return Ok(ResultadoConfirmacion::PublicidadInexistente(id_publicidad)),
    };

    match decidir_marcado(&pago.status, actual.pago) {
        DecisionMarcado::Ignorar => Ok(ResultadoConfirmacion::NoAprobado),
        DecisionMarcado::NoOp => Ok(ResultadoConfirmacion::YaPagada(id_publicidad)),
        DecisionMarcado::Marcar => {
            // Escritura condicional: solo matchea si todavía no estaba
            // pagada, así la carrera webhook/verificación converge sin
            // pisarse.
            let result = publicidades
                .update_one(
                    doc! { "_id": id_publicidad, "pago": false },
                    doc! { "$set": { "pago": true } },
                )
                .await
                .map_err(|e| AppError::database("confirmar_pago", e))?;

            if result.modified_count > 0 {
                tracing::info!(
                    id_publicidad = %id_publicidad.to_hex(),
                    id_pago = pago.id,
                    "Publicidad marcada como pagada"
                );
                Ok(ResultadoConfirmacion::Marcada(id_publicidad))
            } else {
                // El otro camino ganó entre la lectura y la escritura
                Ok(ResultadoConfirmacion::YaPagada(id_publicidad))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pago_aprobado_sin_marcar_se_marca() {
        assert_eq!(decidir_marcado("approved", false), DecisionMarcado::Marcar);
    }

    #[test]
    fn reprocesar_pago_aprobado_es_noop() {
        // ambas vías (verificación y webhook) pasan por acá: reintentos no fallan
        assert_eq!(decidir_marcado("approved", true), DecisionMarcado::NoOp);
    }

    #[test]
    fn estados_no_aprobados_se_ignoran() {
        for status in ["pending", "rejected", "in_process", "cancelled", ""] {
            assert_eq!(decidir_marcado(status, false), DecisionMarcado::Ignorar);
            assert_eq!(decidir_marcado(status, true), DecisionMarcado::Ignorar);
        }
    }
}
