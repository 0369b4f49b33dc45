//! # Estado de aprobación
//!
//! Reservas, reseñas y publicidades comparten el mismo ciclo de moderación:
//! nacen pendientes y un moderador las aprueba o las rechaza con motivo.
//!
//! En los documentos persistidos el estado se guarda aplanado en dos campos
//! (`estado: bool`, `motivo_rechazo: string|null`) para poder filtrar con
//! queries planas, pero en el código el estado es siempre esta variante
//! etiquetada: no hay estados implícitos a base de chequeos de null.

use mongodb::bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

/// Estado de moderación de una reserva, reseña o publicidad
///
/// Transiciones válidas:
/// - `Pendiente → Aprobada` (moderador, sin motivo)
/// - `Pendiente → Rechazada` (moderador, motivo obligatorio)
///
/// `Aprobada` es terminal. Tras un rechazo puede crearse una nueva entidad
/// pendiente, sujeta a las reglas de unicidad de cada recurso.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CamposEstado", into = "CamposEstado")]
pub enum EstadoAprobacion {
    Pendiente,
    Aprobada,
    Rechazada(String),
}

/// Forma persistida: dos campos planos en el documento
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CamposEstado {
    estado: bool,
    #[serde(default)]
    motivo_rechazo: Option<String>,
}

impl From<CamposEstado> for EstadoAprobacion {
    fn from(campos: CamposEstado) -> Self {
        match (campos.estado, campos.motivo_rechazo) {
            (true, _) => EstadoAprobacion::Aprobada,
            (false, None) => EstadoAprobacion::Pendiente,
            (false, Some(motivo)) => EstadoAprobacion::Rechazada(motivo),
        }
    }
}

impl From<EstadoAprobacion> for CamposEstado {
    fn from(estado: EstadoAprobacion) -> Self {
        match estado {
            EstadoAprobacion::Pendiente => CamposEstado {
                estado: false,
                motivo_rechazo: None,
            },
            // Aprobar siempre limpia el motivo
            EstadoAprobacion::Aprobada => CamposEstado {
                estado: true,
                motivo_rechazo: None,
            },
            EstadoAprobacion::Rechazada(motivo) => CamposEstado {
                estado: false,
                motivo_rechazo: Some(motivo),
            },
        }
    }
}

impl EstadoAprobacion {
    pub fn es_pendiente(&self) -> bool {
        matches!(self, EstadoAprobacion::Pendiente)
    }

    pub fn es_aprobada(&self) -> bool {
        matches!(self, EstadoAprobacion::Aprobada)
    }

    /// Nombre legible para respuestas del API
    pub fn nombre(&self) -> &'static str {
        match self {
            EstadoAprobacion::Pendiente => "pendiente",
            EstadoAprobacion::Aprobada => "aprobada",
            EstadoAprobacion::Rechazada(_) => "rechazada",
        }
    }

    /// Filtro Mongo que selecciona documentos aprobados
    pub fn filtro_aprobada() -> Document {
        doc! { "estado": true }
    }

    /// Documento `$set` para persistir una transición de estado
    pub fn a_documento_set(&self) -> Document {
        match self {
            EstadoAprobacion::Pendiente => {
                doc! { "estado": false, "motivo_rechazo": Bson::Null }
            }
            EstadoAprobacion::Aprobada => {
                doc! { "estado": true, "motivo_rechazo": Bson::Null }
            }
            EstadoAprobacion::Rechazada(motivo) => {
                doc! { "estado": false, "motivo_rechazo": motivo }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    #[derive(Debug, Serialize, Deserialize)]
    struct Portador {
        nombre: String,
        #[serde(flatten)]
        estado: EstadoAprobacion,
    }

    #[test]
    fn pendiente_se_aplana_a_false_y_null() {
        let doc = bson::to_document(&Portador {
            nombre: "x".into(),
            estado: EstadoAprobacion::Pendiente,
        })
        .unwrap();
        assert_eq!(doc.get_bool("estado").unwrap(), false);
        assert!(matches!(doc.get("motivo_rechazo"), Some(Bson::Null)));
    }

    #[test]
    fn aprobada_fuerza_motivo_null() {
        let doc = bson::to_document(&Portador {
            nombre: "x".into(),
            estado: EstadoAprobacion::Aprobada,
        })
        .unwrap();
        assert_eq!(doc.get_bool("estado").unwrap(), true);
        assert!(matches!(doc.get("motivo_rechazo"), Some(Bson::Null)));
    }

    #[test]
    fn rechazada_conserva_el_motivo() {
        let portador = Portador {
            nombre: "x".into(),
            estado: EstadoAprobacion::Rechazada("sin lugar".into()),
        };
        let doc = bson::to_document(&portador).unwrap();
        assert_eq!(doc.get_str("motivo_rechazo").unwrap(), "sin lugar");

        let leido: Portador = bson::from_document(doc).unwrap();
        assert_eq!(leido.estado, EstadoAprobacion::Rechazada("sin lugar".into()));
    }

    #[test]
    fn ida_y_vuelta_de_los_tres_estados() {
        for estado in [
            EstadoAprobacion::Pendiente,
            EstadoAprobacion::Aprobada,
            EstadoAprobacion::Rechazada("motivo".into()),
        ] {
            let doc = bson::to_document(&Portador {
                nombre: "x".into(),
                estado: estado.clone(),
            })
            .unwrap();
            let leido: Portador = bson::from_document(doc).unwrap();
            assert_eq!(leido.estado, estado);
        }
    }

    #[test]
    fn motivo_ausente_en_el_documento_es_pendiente() {
        // Documentos viejos pueden no traer el campo motivo_rechazo
        let doc = doc! { "nombre": "x", "estado": false };
        let leido: Portador = bson::from_document(doc).unwrap();
        assert!(leido.estado.es_pendiente());
    }
}
