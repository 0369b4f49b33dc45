//! # API de Reseñas
//!
//! Una reseña solo puede existir atada a una reserva aprobada del mismo
//! par (usuario, comercio). Tras un rechazo de moderación se admite
//! exactamente una reseña nueva; una pendiente o aprobada bloquea el par.

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use super::shop::{comercio_activo, ids_comercios_por_nombre};
use super::user::usuario_activo;
use super::{AppError, AppResult, ErrorLogExt};
use crate::auth::{autorizar, autorizar_administrador};
use crate::config::Configuracion;
use crate::db::{MongoRepo, Resenia};
use crate::domain::rules::{
    estado_para_transicion, validar_comentario, validar_elegibilidad_resenia, validar_puntaje,
};
use crate::domain::EstadoAprobacion;

#[derive(Deserialize)]
struct CrearResenia {
    id_usuario: String,
    id_comercio: String,
    /// Entero 1..=5
    puntaje: i32,
    comentario: String,
}

#[derive(Deserialize)]
struct ActualizarResenia {
    id: String,
    id_usuario: String,
    id_comercio: String,
    puntaje: i32,
    comentario: String,
}

#[derive(Deserialize)]
struct CambioEstado {
    aprobar: bool,
    motivo: Option<String>,
}

#[derive(Serialize)]
struct ReseniaResponse {
    id: String,
    id_usuario: String,
    id_comercio: String,
    puntaje: i32,
    comentario: String,
    estado: String,
    motivo_rechazo: Option<String>,
    fecha_creacion: i64,
}

impl From<Resenia> for ReseniaResponse {
    fn from(resenia: Resenia) -> Self {
        let motivo_rechazo = match &resenia.estado {
            EstadoAprobacion::Rechazada(motivo) => Some(motivo.clone()),
            _ => None,
        };
        ReseniaResponse {
            id: resenia.id.map(|id| id.to_hex()).unwrap_or_default(),
            id_usuario: resenia.id_usuario.to_hex(),
            id_comercio: resenia.id_comercio.to_hex(),
            puntaje: resenia.puntaje,
            comentario: resenia.comentario,
            estado: resenia.estado.nombre().to_string(),
            motivo_rechazo,
            fecha_creacion: resenia.fecha_creacion,
        }
    }
}

/// Crea una nueva reseña (siempre nace pendiente de moderación)
///
/// # Reglas de elegibilidad
/// 1. Usuario y comercio activos
/// 2. Al menos una reserva aprobada del par (usuario, comercio)
/// 3. Ninguna reseña pendiente ni aprobada ya existente para el par;
///    una rechazada no bloquea
///
/// # Validaciones
/// - Puntaje entero entre 1 y 5
/// - Comentario sin palabras prohibidas (lista configurada)
///
/// # Respuesta
/// ```json
/// {
///   "message": "Reseña creada correctamente",
///   "id": "507f1f77bcf86cd799439011",
///   "estado": "pendiente"
/// }
/// ```
///
/// # Errores
/// - `400 Bad Request`: Cualquiera de las reglas o validaciones
/// - `401 Unauthorized`: Sesión inválida
#[post("/resenias/crear")]
async fn make_review(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    data: web::Json<CrearResenia>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    validar_puntaje(data.puntaje)?;
    validar_comentario(&data.comentario, &config.palabras_prohibidas)?;

    let id_usuario = ObjectId::parse_str(&data.id_usuario)
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;
    let id_comercio = ObjectId::parse_str(&data.id_comercio)
        .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;

    usuario_activo(repo.get_ref(), id_usuario).await?;
    comercio_activo(repo.get_ref(), id_comercio).await?;

    // Precondición de elegibilidad: una reserva aprobada del par,
    // independiente del historial de reseñas
    let mut filtro_reserva = doc! { "id_usuario": id_usuario, "id_comercio": id_comercio };
    filtro_reserva.extend(EstadoAprobacion::filtro_aprobada());

    let reserva_aprobada = repo
        .reservas()
        .find_one(filtro_reserva)
        .await
        .log_error_context("checking approved reservation")
        .map_err(|e| AppError::database("reserva_aprobada", e))?;

    let resenias = repo.resenias();
    let mut cursor = resenias
        .find(doc! { "id_usuario": id_usuario, "id_comercio": id_comercio })
        .await
        .map_err(|e| AppError::database("resenias_existentes", e))?;

    let mut estados = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let existente = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando reseña: {}", e)))?;
        estados.push(existente.estado);
    }

    validar_elegibilidad_resenia(reserva_aprobada.is_some(), &estados)?;

    let resenia = Resenia {
        id: None,
        id_usuario,
        id_comercio,
        puntaje: data.puntaje,
        comentario: data.comentario.clone(),
        estado: EstadoAprobacion::Pendiente,
        fecha_creacion: MongoRepo::current_timestamp(),
    };

    let result = resenias
        .insert_one(resenia)
        .await
        .log_error_context("inserting new review")
        .map_err(|e| AppError::database("crear_resenia", e))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Reseña creada correctamente",
        "id": result.inserted_id.as_object_id().map(|id| id.to_hex()),
        "estado": "pendiente"
    })))
}

/// Lista todas las reseñas
#[get("/resenias/listado")]
async fn get_reviews(repo: web::Data<MongoRepo>) -> AppResult<impl Responder> {
    let resenias = cargar_resenias(repo.get_ref(), doc! {}).await?;
    Ok(HttpResponse::Ok().json(
        resenias
            .into_iter()
            .map(ReseniaResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Busca una reseña por ID
#[get("/resenias/buscar-id/{id}")]
async fn get_review_by_id(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de reseña inválido".to_string()))?;

    let resenia = repo
        .resenias()
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_resenia", e))?
        .ok_or(AppError::NotFound("Reseña no encontrada".to_string()))?;

    Ok(HttpResponse::Ok().json(ReseniaResponse::from(resenia)))
}

/// Busca reseñas por nombre de comercio (substring, sin distinguir
/// mayúsculas)
#[get("/resenias/buscar-nombre-comercio/{comercio}")]
async fn get_reviews_by_shop_name(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let nombre = path.into_inner();
    let ids = ids_comercios_por_nombre(repo.get_ref(), &nombre).await?;

    let resenias = cargar_resenias(repo.get_ref(), doc! { "id_comercio": { "$in": ids } }).await?;
    Ok(HttpResponse::Ok().json(
        resenias
            .into_iter()
            .map(ReseniaResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Reemplaza una reseña completa
///
/// El puntaje y el comentario se re-validan con las mismas reglas que al
/// crear. Estado de moderación y fecha de creación se conservan.
#[put("/resenias/actualizar/{id}")]
async fn update_review(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    data: web::Json<ActualizarResenia>,
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
        .map_err(|_| AppError::Validation("ID de reseña inválido".to_string()))?;

    // Mismas reglas que en el alta
    validar_puntaje(data.puntaje)?;
    validar_comentario(&data.comentario, &config.palabras_prohibidas)?;

    let id_usuario = ObjectId::parse_str(&data.id_usuario)
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;
    let id_comercio = ObjectId::parse_str(&data.id_comercio)
        .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;

    let resenias = repo.resenias();

    let actual = resenias
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_resenia", e))?
        .ok_or(AppError::NotFound("Reseña no encontrada".to_string()))?;

    let reemplazo = Resenia {
        id: Some(id),
        id_usuario,
        id_comercio,
        puntaje: data.puntaje,
        comentario: data.comentario.clone(),
        estado: actual.estado,
        fecha_creacion: actual.fecha_creacion,
    };

    let result = resenias
        .replace_one(doc! { "_id": id }, reemplazo)
        .await
        .map_err(|e| AppError::database("actualizar_resenia", e))?;

    // Conflicto optimista: re-chequear existencia antes de responder
    if result.matched_count == 0 {
        let existe = resenias
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("reexistencia_resenia", e))?;
        return match existe {
            None => Err(AppError::NotFound("Reseña no encontrada".to_string())),
            Some(_) => Err(AppError::Conflict(
                "La reseña fue modificada por otra operación".to_string(),
            )),
        };
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Aprueba o rechaza una reseña (moderación, admin)
#[put("/resenias/cambiar-estado/{id}")]
async fn moderate_review(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    data: web::Json<CambioEstado>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar_administrador(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de reseña inválido".to_string()))?;

    let estado = estado_para_transicion(data.aprobar, data.motivo.as_deref())?;

    let result = repo
        .resenias()
        .update_one(doc! { "_id": id }, doc! { "$set": estado.a_documento_set() })
        .await
        .map_err(|e| AppError::database("cambiar_estado_resenia", e))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Reseña no encontrada".to_string()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Estado de la reseña actualizado",
        "id": id.to_hex(),
        "estado": estado.nombre()
    })))
}

/// Elimina una reseña
#[delete("/resenias/eliminar/{id}")]
async fn delete_review(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de reseña inválido".to_string()))?;

    let result = repo
        .resenias()
        .delete_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("eliminar_resenia", e))?;

    if result.deleted_count == 0 {
        return Err(AppError::NotFound("Reseña no encontrada".to_string()));
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Carga reseñas según el filtro dado
async fn cargar_resenias(
    repo: &MongoRepo,
    filtro: mongodb::bson::Document,
) -> AppResult<Vec<Resenia>> {
    let mut cursor = repo
        .resenias()
        .find(filtro)
        .await
        .map_err(|e| AppError::database("listar_resenias", e))?;

    let mut resultados = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let resenia = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando reseña: {}", e)))?;
        resultados.push(resenia);
    }
    Ok(resultados)
}

/// Configura las rutas relacionadas con reseñas
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(make_review);
    cfg.service(get_reviews);
    cfg.service(get_review_by_id);
    cfg.service(get_reviews_by_shop_name);
    cfg.service(update_review);
    cfg.service(moderate_review);
    cfg.service(delete_review);
}
