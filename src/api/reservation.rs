//! # API de Reservas
//!
//! Este módulo maneja el ciclo de vida completo de una reserva:
//! - Crear nuevas reservas (siempre nacen pendientes)
//! - Listar y buscar reservas
//! - Moderar reservas (aprobar o rechazar con motivo)
//! - Actualizar y eliminar reservas
//!
//! ## Máquina de estados
//!
//! `pendiente → {aprobada, rechazada}`. Para una misma terna
//! (usuario, comercio, fecha) puede haber a lo sumo una reserva pendiente y
//! a lo sumo una aprobada; una rechazada no bloquea volver a reservar.
//! Los conflictos se comparan a granularidad de día.

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use chrono::NaiveDate;
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::shop::comercio_activo;
use super::user::usuario_activo;
use super::{AppError, AppResult, ErrorLogExt};
use crate::auth::{autorizar, autorizar_administrador};
use crate::config::Configuracion;
use crate::db::{MongoRepo, Reserva};
use crate::domain::rules::{estado_para_transicion, validar_conflicto_reserva};
use crate::domain::EstadoAprobacion;

/// Estructura para crear una nueva reserva
#[derive(Deserialize)]
struct CrearReserva {
    /// ID del usuario que reserva (ObjectId como string)
    id_usuario: String,
    /// ID del comercio (ObjectId como string)
    id_comercio: String,
    /// Fecha de la reserva (formato YYYY-MM-DD)
    fecha: String,
    /// Número de comensales
    comensales: i32,
    /// Tolerancia de espera en minutos
    tolerancia_minutos: i64,
}

/// Estructura para actualizar una reserva completa
#[derive(Deserialize)]
struct ActualizarReserva {
    id: String,
    id_usuario: String,
    id_comercio: String,
    fecha: String,
    comensales: i32,
    tolerancia_minutos: i64,
}

/// Cuerpo de la transición de moderación
#[derive(Deserialize)]
struct CambioEstado {
    /// true = aprobar, false = rechazar
    aprobar: bool,
    /// Obligatorio al rechazar, ignorado al aprobar
    motivo: Option<String>,
}

/// Parámetros de consulta para listar reservas
#[derive(Deserialize)]
struct ReservationQuery {
    /// Filtrar por solicitante (ObjectId como string)
    id_usuario: Option<String>,
    /// Filtrar por comercio (ObjectId como string)
    id_comercio: Option<String>,
}

/// Versión de la reserva para envío al frontend, con ObjectIds
/// convertidos a strings
#[derive(Serialize)]
struct ReservaResponse {
    id: String,
    id_usuario: String,
    id_comercio: String,
    fecha_reserva: String,
    comensales: i32,
    tolerancia_minutos: i64,
    /// "pendiente", "aprobada" o "rechazada"
    estado: String,
    motivo_rechazo: Option<String>,
    fecha_creacion: i64,
}

impl From<Reserva> for ReservaResponse {
    fn from(reserva: Reserva) -> Self {
        let motivo_rechazo = match &reserva.estado {
            EstadoAprobacion::Rechazada(motivo) => Some(motivo.clone()),
            _ => None,
        };
        ReservaResponse {
            id: reserva.id.map(|id| id.to_hex()).unwrap_or_default(),
            id_usuario: reserva.id_usuario.to_hex(),
            id_comercio: reserva.id_comercio.to_hex(),
            fecha_reserva: reserva.fecha_reserva,
            comensales: reserva.comensales,
            tolerancia_minutos: reserva.tolerancia_minutos,
            estado: reserva.estado.nombre().to_string(),
            motivo_rechazo,
            fecha_creacion: reserva.fecha_creacion,
        }
    }
}

/// Valida y parsea una fecha en formato YYYY-MM-DD
///
/// # Errores
/// - `Validation`: Si el formato de fecha es incorrecto
pub fn validate_date(date_str: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("Formato de fecha inválido, use YYYY-MM-DD".to_string()))
}

/// Crea una nueva reserva
///
/// # Autenticación
/// Requiere sesión válida.
///
/// # Validaciones
/// - El usuario debe existir y estar activo
/// - El comercio debe existir y estar activo
/// - La fecha debe ser válida (YYYY-MM-DD)
/// - El número de comensales debe ser mayor a 0
/// - No debe existir otra reserva pendiente ni aprobada del mismo usuario
///   para el mismo comercio y fecha
///
/// # Respuesta
/// ```json
/// {
///   "message": "Reserva creada correctamente",
///   "id": "507f1f77bcf86cd799439011",
///   "estado": "pendiente"
/// }
/// ```
///
/// # Errores
/// - `400 Bad Request`: Validación o conflicto de reservas
/// - `401 Unauthorized`: Sesión inválida
/// - `500 Internal Server Error`: Error de base de datos
#[post("/reservas/crear")]
async fn make_reservation(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    data: web::Json<CrearReserva>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    let id_usuario = ObjectId::parse_str(&data.id_usuario)
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;
    let id_comercio = ObjectId::parse_str(&data.id_comercio)
        .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;

    let fecha = validate_date(&data.fecha)?;

    if data.comensales <= 0 {
        return Err(AppError::Validation(
            "El número de comensales debe ser mayor a 0".to_string(),
        ));
    }

    if data.tolerancia_minutos < 0 {
        return Err(AppError::Validation(
            "La tolerancia no puede ser negativa".to_string(),
        ));
    }

    usuario_activo(repo.get_ref(), id_usuario).await?;
    comercio_activo(repo.get_ref(), id_comercio).await?;

    // Cargar los estados de las reservas existentes de la terna y decidir
    let reservas = repo.reservas();
    let mut cursor = reservas
        .find(doc! {
            "id_usuario": id_usuario,
            "id_comercio": id_comercio,
            "fecha_reserva": fecha.format("%Y-%m-%d").to_string(),
        })
        .await
        .log_error_context("checking reservation conflicts")
        .map_err(|e| AppError::database("conflictos_reserva", e))?;

    let mut estados = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let existente = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando reserva: {}", e)))?;
        estados.push(existente.estado);
    }

    validar_conflicto_reserva(&estados)?;

    let reserva = Reserva {
        id: None,
        id_usuario,
        id_comercio,
        fecha_reserva: fecha.format("%Y-%m-%d").to_string(),
        comensales: data.comensales,
        tolerancia_minutos: data.tolerancia_minutos,
        estado: EstadoAprobacion::Pendiente,
        fecha_creacion: MongoRepo::current_timestamp(),
    };

    let result = reservas
        .insert_one(reserva)
        .await
        .log_error_context("inserting new reservation")
        .map_err(|e| AppError::database("crear_reserva", e))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Reserva creada correctamente",
        "id": result.inserted_id.as_object_id().map(|id| id.to_hex()),
        "estado": "pendiente"
    })))
}

/// Lista las reservas, con filtros opcionales por solicitante y comercio
///
/// Las reservas cuyo solicitante está inactivo no se incluyen.
///
/// # Errores
/// - `400 Bad Request`: Filtro con ID inválido
/// - `500 Internal Server Error`: Error de base de datos
#[get("/reservas/listado")]
async fn get_reservations(
    repo: web::Data<MongoRepo>,
    query: web::Query<ReservationQuery>,
) -> AppResult<impl Responder> {
    // Construir filtro dinámico basado en parámetros
    let mut filter = doc! {};

    if let Some(id_usuario) = &query.id_usuario {
        let id = ObjectId::parse_str(id_usuario)
            .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;
        filter.insert("id_usuario", id);
    }

    if let Some(id_comercio) = &query.id_comercio {
        let id = ObjectId::parse_str(id_comercio)
            .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;
        filter.insert("id_comercio", id);
    }

    let reservas = cargar_reservas(repo.get_ref(), filter).await?;
    let visibles = excluir_solicitantes_inactivos(repo.get_ref(), reservas).await?;

    Ok(HttpResponse::Ok().json(
        visibles
            .into_iter()
            .map(ReservaResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Busca una reserva por su ID
///
/// # Errores
/// - `400 Bad Request`: ID inválido
/// - `404 Not Found`: Reserva no encontrada
#[get("/reservas/buscar-id/{id}")]
async fn get_reservation_by_id(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de reserva inválido".to_string()))?;

    let reserva = repo
        .reservas()
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_reserva", e))?
        .ok_or(AppError::NotFound("Reserva no encontrada".to_string()))?;

    Ok(HttpResponse::Ok().json(ReservaResponse::from(reserva)))
}

/// Busca reservas por nombre de comercio (substring, sin distinguir
/// mayúsculas). Excluye solicitantes inactivos.
#[get("/reservas/buscar-nombre-comercio/{comercio}")]
async fn get_reservations_by_shop_name(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let nombre = path.into_inner();
    let ids_comercios = super::shop::ids_comercios_por_nombre(repo.get_ref(), &nombre).await?;

    let reservas = cargar_reservas(
        repo.get_ref(),
        doc! { "id_comercio": { "$in": ids_comercios } },
    )
    .await?;
    let visibles = excluir_solicitantes_inactivos(repo.get_ref(), reservas).await?;

    Ok(HttpResponse::Ok().json(
        visibles
            .into_iter()
            .map(ReservaResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Reemplaza una reserva completa
///
/// # Respuesta
/// `204 No Content` en caso de éxito.
///
/// # Errores
/// - `400 Bad Request`: ID del path distinto al del cuerpo, o datos inválidos
/// - `404 Not Found`: La reserva no existe (incluso si desapareció durante
///   una actualización concurrente)
#[put("/reservas/actualizar/{id}")]
async fn update_reservation(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    data: web::Json<ActualizarReserva>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    let id_path = path.into_inner();
    if id_path != data.id {
        return Err(AppError::Validation(
            "El ID del path no coincide con el del cuerpo".to_string(),
        ));
    }

    let id = ObjectId::parse_str(&id_path)
        .map_err(|_| AppError::Validation("ID de reserva inválido".to_string()))?;
    let id_usuario = ObjectId::parse_str(&data.id_usuario)
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;
    let id_comercio = ObjectId::parse_str(&data.id_comercio)
        .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;

    let fecha = validate_date(&data.fecha)?;

    if data.comensales <= 0 {
        return Err(AppError::Validation(
            "El número de comensales debe ser mayor a 0".to_string(),
        ));
    }

    let reservas = repo.reservas();

    // El reemplazo conserva estado y fecha de creación actuales
    let actual = reservas
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_reserva", e))?
        .ok_or(AppError::NotFound("Reserva no encontrada".to_string()))?;

    let reemplazo = Reserva {
        id: Some(id),
        id_usuario,
        id_comercio,
        fecha_reserva: fecha.format("%Y-%m-%d").to_string(),
        comensales: data.comensales,
        tolerancia_minutos: data.tolerancia_minutos,
        estado: actual.estado,
        fecha_creacion: actual.fecha_creacion,
    };

    let result = reservas
        .replace_one(doc! { "_id": id }, reemplazo)
        .await
        .map_err(|e| AppError::database("actualizar_reserva", e))?;

    // Conflicto optimista: la fila cambió o desapareció entre lectura y
    // escritura. Se re-chequea existencia para decidir la respuesta.
    if result.matched_count == 0 {
        let existe = reservas
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("reexistencia_reserva", e))?;
        return match existe {
            None => Err(AppError::NotFound("Reserva no encontrada".to_string())),
            Some(_) => Err(AppError::Conflict(
                "La reserva fue modificada por otra operación".to_string(),
            )),
        };
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Aprueba o rechaza una reserva pendiente
///
/// # Autenticación
/// Requiere rol administrador.
///
/// # Reglas
/// - Aprobar limpia cualquier motivo de rechazo
/// - Rechazar exige un motivo no vacío
///
/// # Respuesta
/// ```json
/// {
///   "message": "Estado de la reserva actualizado",
///   "id": "507f1f77bcf86cd799439011",
///   "estado": "aprobada"
/// }
/// ```
///
/// # Errores
/// - `400 Bad Request`: Rechazo sin motivo o ID inválido
/// - `401 Unauthorized`: Sesión inválida o sin rol administrador
/// - `404 Not Found`: Reserva no encontrada
#[put("/reservas/cambiar-estado/{id}")]
async fn moderate_reservation(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    data: web::Json<CambioEstado>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar_administrador(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de reserva inválido".to_string()))?;

    let estado = estado_para_transicion(data.aprobar, data.motivo.as_deref())?;

    let result = repo
        .reservas()
        .update_one(doc! { "_id": id }, doc! { "$set": estado.a_documento_set() })
        .await
        .map_err(|e| AppError::database("cambiar_estado_reserva", e))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Reserva no encontrada".to_string()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Estado de la reserva actualizado",
        "id": id.to_hex(),
        "estado": estado.nombre()
    })))
}

/// Elimina una reserva sin restricción de estado
///
/// # Errores
/// - `400 Bad Request`: ID inválido
/// - `401 Unauthorized`: Sesión inválida
/// - `404 Not Found`: Reserva no encontrada
#[delete("/reservas/eliminar/{id}")]
async fn delete_reservation(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de reserva inválido".to_string()))?;

    let result = repo
        .reservas()
        .delete_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("eliminar_reserva", e))?;

    if result.deleted_count == 0 {
        return Err(AppError::NotFound("Reserva no encontrada".to_string()));
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Carga reservas según el filtro dado
async fn cargar_reservas(
    repo: &MongoRepo,
    filtro: mongodb::bson::Document,
) -> AppResult<Vec<Reserva>> {
    let mut cursor = repo
        .reservas()
        .find(filtro)
        .await
        .map_err(|e| AppError::database("listar_reservas", e))?;

    let mut resultados = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let reserva = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando reserva: {}", e)))?;
        resultados.push(reserva);
    }
    Ok(resultados)
}

/// Filtra las reservas cuyos solicitantes están inactivos
async fn excluir_solicitantes_inactivos(
    repo: &MongoRepo,
    reservas: Vec<Reserva>,
) -> AppResult<Vec<Reserva>> {
    let mut cursor = repo
        .usuarios()
        .find(doc! { "activo": false })
        .await
        .map_err(|e| AppError::database("usuarios_inactivos", e))?;

    let mut inactivos = HashSet::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let usuario = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando usuario: {}", e)))?;
        if let Some(id) = usuario.id {
            inactivos.insert(id);
        }
    }

    Ok(reservas
        .into_iter()
        .filter(|r| !inactivos.contains(&r.id_usuario))
        .collect())
}

/// Configura las rutas relacionadas con reservas
///
/// # Rutas disponibles
/// - `POST /reservas/crear` - Crear nueva reserva
/// - `GET /reservas/listado` - Listar reservas
/// - `GET /reservas/buscar-id/{id}` - Buscar por ID
/// - `GET /reservas/buscar-nombre-comercio/{comercio}` - Buscar por comercio
/// - `PUT /reservas/actualizar/{id}` - Reemplazo completo
/// - `PUT /reservas/cambiar-estado/{id}` - Moderación (admin)
/// - `DELETE /reservas/eliminar/{id}` - Eliminar
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(make_reservation);
    cfg.service(get_reservations);
    cfg.service(get_reservation_by_id);
    cfg.service(get_reservations_by_shop_name);
    cfg.service(update_reservation);
    cfg.service(moderate_reservation);
    cfg.service(delete_reservation);
}
