//! # Reglas de negocio puras
//!
//! Las reglas de conflicto de reservas, elegibilidad de reseñas y
//! transiciones de moderación se evalúan acá sobre datos ya cargados.
//! Los handlers consultan Mongo y delegan la decisión en estas funciones.

use crate::api::AppError;
use crate::domain::approval::EstadoAprobacion;

/// Regla de unicidad de reservas para una terna (usuario, comercio, fecha).
///
/// A lo sumo una reserva pendiente y a lo sumo una aprobada pueden existir
/// para la terna. Una reserva rechazada no bloquea crear otra.
pub fn validar_conflicto_reserva(existentes: &[EstadoAprobacion]) -> Result<(), AppError> {
    if existentes.iter().any(|e| e.es_pendiente()) {
        return Err(AppError::Conflict(
            "Ya existe una reserva pendiente para ese comercio y fecha".to_string(),
        ));
    }
    if existentes.iter().any(|e| e.es_aprobada()) {
        return Err(AppError::Conflict(
            "Ya existe una reserva aprobada para ese comercio y fecha".to_string(),
        ));
    }
    Ok(())
}

/// Elegibilidad para crear una reseña de (usuario, comercio).
///
/// Requiere al menos una reserva aprobada del par, y que no exista ya una
/// reseña pendiente o aprobada. Una reseña rechazada habilita exactamente
/// un reintento: la nueva reseña pendiente vuelve a bloquear el par.
pub fn validar_elegibilidad_resenia(
    tiene_reserva_aprobada: bool,
    resenias_existentes: &[EstadoAprobacion],
) -> Result<(), AppError> {
    if !tiene_reserva_aprobada {
        return Err(AppError::Validation(
            "Solo se puede reseñar un comercio con una reserva aprobada".to_string(),
        ));
    }
    if resenias_existentes
        .iter()
        .any(|e| e.es_pendiente() || e.es_aprobada())
    {
        return Err(AppError::Conflict(
            "Ya existe una reseña pendiente o aprobada para este comercio".to_string(),
        ));
    }
    Ok(())
}

/// El puntaje de una reseña es un entero entre 1 y 5, tanto al crear
/// como al actualizar.
pub fn validar_puntaje(puntaje: i32) -> Result<(), AppError> {
    if !(1..=5).contains(&puntaje) {
        return Err(AppError::validation_field(
            "puntaje",
            "debe ser un entero entre 1 y 5",
        ));
    }
    Ok(())
}

/// Chequea el comentario contra la lista inyectada de palabras prohibidas
pub fn validar_comentario(comentario: &str, prohibidas: &[String]) -> Result<(), AppError> {
    let minusculas = comentario.to_lowercase();
    if prohibidas
        .iter()
        .any(|p| !p.is_empty() && minusculas.contains(&p.to_lowercase()))
    {
        return Err(AppError::validation_field(
            "comentario",
            "contiene palabras no admitidas",
        ));
    }
    Ok(())
}

/// Chequea el dominio del correo contra la lista inyectada de dominios
/// permitidos. Lista vacía = sin restricción.
pub fn validar_dominio_correo(correo: &str, permitidos: &[String]) -> Result<(), AppError> {
    let dominio = correo
        .rsplit_once('@')
        .map(|(_, d)| d.to_lowercase())
        .ok_or_else(|| AppError::validation_field("correo", "formato de correo inválido"))?;

    if dominio.is_empty() || !correo.contains('.') {
        return Err(AppError::validation_field("correo", "formato de correo inválido"));
    }

    if !permitidos.is_empty() && !permitidos.iter().any(|p| p.to_lowercase() == dominio) {
        return Err(AppError::validation_field(
            "correo",
            "el dominio de correo no está permitido",
        ));
    }
    Ok(())
}

/// Construye el estado destino de una transición de moderación.
///
/// Aprobar descarta cualquier motivo recibido; rechazar exige un motivo
/// no vacío.
pub fn estado_para_transicion(
    aprobar: bool,
    motivo: Option<&str>,
) -> Result<EstadoAprobacion, AppError> {
    if aprobar {
        return Ok(EstadoAprobacion::Aprobada);
    }
    match motivo.map(str::trim) {
        Some(m) if !m.is_empty() => Ok(EstadoAprobacion::Rechazada(m.to_string())),
        _ => Err(AppError::Validation(
            "Para rechazar es obligatorio indicar un motivo".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EstadoAprobacion::{Aprobada, Pendiente, Rechazada};

    fn rechazada() -> EstadoAprobacion {
        Rechazada("sin lugar".to_string())
    }

    // ---- reservas ----

    #[test]
    fn sin_reservas_previas_no_hay_conflicto() {
        assert!(validar_conflicto_reserva(&[]).is_ok());
    }

    #[test]
    fn una_pendiente_bloquea_la_terna() {
        let err = validar_conflicto_reserva(&[Pendiente]).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn una_aprobada_bloquea_la_terna() {
        let err = validar_conflicto_reserva(&[Aprobada]).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn una_rechazada_no_bloquea() {
        assert!(validar_conflicto_reserva(&[rechazada()]).is_ok());
        assert!(validar_conflicto_reserva(&[rechazada(), rechazada()]).is_ok());
    }

    #[test]
    fn rechazada_mas_pendiente_sigue_bloqueando() {
        assert!(validar_conflicto_reserva(&[rechazada(), Pendiente]).is_err());
    }

    // ---- reseñas ----

    #[test]
    fn sin_reserva_aprobada_no_se_puede_reseniar() {
        let err = validar_elegibilidad_resenia(false, &[]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn con_reserva_aprobada_y_sin_resenias_se_puede() {
        assert!(validar_elegibilidad_resenia(true, &[]).is_ok());
    }

    #[test]
    fn resenia_pendiente_o_aprobada_bloquea_duplicados() {
        assert!(validar_elegibilidad_resenia(true, &[Pendiente]).is_err());
        assert!(validar_elegibilidad_resenia(true, &[Aprobada]).is_err());
    }

    #[test]
    fn resenia_rechazada_habilita_un_reintento() {
        // tras el rechazo se permite exactamente una reseña nueva
        assert!(validar_elegibilidad_resenia(true, &[rechazada()]).is_ok());
        // el reintento pendiente vuelve a bloquear hasta ser moderado
        assert!(validar_elegibilidad_resenia(true, &[rechazada(), Pendiente]).is_err());
    }

    #[test]
    fn la_elegibilidad_no_depende_del_historial_de_resenias() {
        // reserva aprobada ausente falla aunque haya reseñas rechazadas
        assert!(validar_elegibilidad_resenia(false, &[rechazada()]).is_err());
    }

    // ---- puntaje ----

    #[test]
    fn puntajes_limite() {
        assert!(validar_puntaje(1).is_ok());
        assert!(validar_puntaje(5).is_ok());
        assert!(validar_puntaje(0).is_err());
        assert!(validar_puntaje(6).is_err());
        assert!(validar_puntaje(-3).is_err());
    }

    // ---- comentarios y correos ----

    #[test]
    fn comentario_con_palabra_prohibida_falla() {
        let prohibidas = vec!["estafa".to_string()];
        assert!(validar_comentario("Una ESTAFA total", &prohibidas).is_err());
        assert!(validar_comentario("Excelente lugar", &prohibidas).is_ok());
    }

    #[test]
    fn lista_vacia_admite_cualquier_comentario() {
        assert!(validar_comentario("lo que sea", &[]).is_ok());
    }

    #[test]
    fn dominio_de_correo_contra_lista_permitida() {
        let permitidos = vec!["gmail.com".to_string()];
        assert!(validar_dominio_correo("ana@gmail.com", &permitidos).is_ok());
        assert!(validar_dominio_correo("ana@Gmail.COM", &permitidos).is_ok());
        assert!(validar_dominio_correo("ana@hotmail.com", &permitidos).is_err());
    }

    #[test]
    fn lista_vacia_admite_cualquier_dominio() {
        assert!(validar_dominio_correo("ana@loquesea.com", &[]).is_ok());
    }

    #[test]
    fn correo_sin_arroba_es_invalido() {
        assert!(validar_dominio_correo("ana.gmail.com", &[]).is_err());
    }

    // ---- transiciones ----

    #[test]
    fn aprobar_descarta_el_motivo() {
        let estado = estado_para_transicion(true, Some("ignorado")).unwrap();
        assert_eq!(estado, Aprobada);
    }

    #[test]
    fn rechazar_exige_motivo() {
        assert!(estado_para_transicion(false, None).is_err());
        assert!(estado_para_transicion(false, Some("   ")).is_err());
        let estado = estado_para_transicion(false, Some("no cumple requisitos")).unwrap();
        assert_eq!(estado, Rechazada("no cumple requisitos".to_string()));
    }
}
