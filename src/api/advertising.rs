//! # API de Publicidades
//!
//! Una publicidad combina dos ejes independientes: el estado de moderación
//! (pendiente/aprobada/rechazada) y el flag de pago. El flag de pago lo
//! escribe únicamente la conciliación de pagos (ver [`crate::payments`]);
//! estos handlers solo lo exponen.

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};

use super::shop::{comercio_activo, ids_comercios_por_nombre};
use super::{AppError, AppResult, ErrorLogExt};
use crate::auth::{autorizar, autorizar_administrador};
use crate::config::Configuracion;
use crate::db::{MongoRepo, Publicidad};
use crate::domain::images::tipo_contenido;
use crate::domain::rules::estado_para_transicion;
use crate::domain::EstadoAprobacion;

/// Datos del alta. El estado y el pago no se aceptan del cliente:
/// toda publicidad nace pendiente y sin pagar.
#[derive(Deserialize)]
struct CrearPublicidad {
    id_comercio: String,
    descripcion: String,
    /// Duración de exhibición en segundos
    tiempo_segundos: i64,
    /// Imagen codificada en base64
    imagen: Option<String>,
}

#[derive(Deserialize)]
struct CambioEstado {
    aprobar: bool,
    motivo: Option<String>,
}

#[derive(Serialize)]
struct PublicidadResponse {
    id: String,
    id_comercio: String,
    descripcion: String,
    visualizaciones: i64,
    tiempo_segundos: i64,
    tiene_imagen: bool,
    estado: String,
    motivo_rechazo: Option<String>,
    pago: bool,
    fecha_creacion: i64,
}

impl From<Publicidad> for PublicidadResponse {
    fn from(publicidad: Publicidad) -> Self {
        let motivo_rechazo = match &publicidad.estado {
            EstadoAprobacion::Rechazada(motivo) => Some(motivo.clone()),
            _ => None,
        };
        PublicidadResponse {
            id: publicidad.id.map(|id| id.to_hex()).unwrap_or_default(),
            id_comercio: publicidad.id_comercio.to_hex(),
            descripcion: publicidad.descripcion,
            visualizaciones: publicidad.visualizaciones,
            tiempo_segundos: publicidad.tiempo_segundos,
            tiene_imagen: publicidad.imagen.is_some(),
            estado: publicidad.estado.nombre().to_string(),
            motivo_rechazo,
            pago: publicidad.pago,
            fecha_creacion: publicidad.fecha_creacion,
        }
    }
}

/// Crea una nueva publicidad
///
/// El servidor fuerza `estado = pendiente`, `pago = false` y
/// `visualizaciones = 0`, ignorando cualquier valor que venga del cliente.
/// El id de la publicidad (en hex) es la referencia externa que viaja al
/// proveedor de pagos.
///
/// # Errores
/// - `400 Bad Request`: Comercio inexistente/inactivo o datos inválidos
/// - `401 Unauthorized`: Sesión inválida
#[post("/publicidades/crear")]
async fn create_advertising(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    data: web::Json<CrearPublicidad>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    if data.descripcion.trim().is_empty() {
        return Err(AppError::Validation("La descripción es requerida".to_string()));
    }

    if data.tiempo_segundos <= 0 {
        return Err(AppError::Validation(
            "La duración debe ser mayor a 0".to_string(),
        ));
    }

    let id_comercio = ObjectId::parse_str(&data.id_comercio)
        .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;

    comercio_activo(repo.get_ref(), id_comercio).await?;

    let imagen = match &data.imagen {
        Some(i) => Some(super::shop::decodificar_foto(i)?),
        None => None,
    };

    let publicidad = Publicidad {
        id: None,
        id_comercio,
        descripcion: data.descripcion.clone(),
        visualizaciones: 0,
        tiempo_segundos: data.tiempo_segundos,
        imagen,
        estado: EstadoAprobacion::Pendiente,
        pago: false,
        fecha_creacion: MongoRepo::current_timestamp(),
    };

    let result = repo
        .publicidades()
        .insert_one(publicidad)
        .await
        .log_error_context("inserting new advertising")
        .map_err(|e| AppError::database("crear_publicidad", e))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Publicidad creada correctamente",
        "id": result.inserted_id.as_object_id().map(|id| id.to_hex()),
        "estado": "pendiente",
        "pago": false
    })))
}

/// Lista todas las publicidades
#[get("/publicidades/listado")]
async fn get_advertisements(repo: web::Data<MongoRepo>) -> AppResult<impl Responder> {
    let publicidades = cargar_publicidades(repo.get_ref(), doc! {}).await?;
    Ok(HttpResponse::Ok().json(
        publicidades
            .into_iter()
            .map(PublicidadResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Busca una publicidad por ID
#[get("/publicidades/buscar-id/{id}")]
async fn get_advertising_by_id(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de publicidad inválido".to_string()))?;

    let publicidad = repo
        .publicidades()
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_publicidad", e))?
        .ok_or(AppError::NotFound("Publicidad no encontrada".to_string()))?;

    Ok(HttpResponse::Ok().json(PublicidadResponse::from(publicidad)))
}

/// Busca publicidades por nombre de comercio (substring, sin distinguir
/// mayúsculas)
#[get("/publicidades/buscar-nombre-comercio/{comercio}")]
async fn get_advertising_by_shop_name(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let nombre = path.into_inner();
    let ids = ids_comercios_por_nombre(repo.get_ref(), &nombre).await?;

    let publicidades =
        cargar_publicidades(repo.get_ref(), doc! { "id_comercio": { "$in": ids } }).await?;
    Ok(HttpResponse::Ok().json(
        publicidades
            .into_iter()
            .map(PublicidadResponse::from)
            .collect::<Vec<_>>(),
    ))
}

/// Aprueba o rechaza una publicidad (moderación, admin)
///
/// # Errores
/// - `400 Bad Request`: Rechazo sin motivo
/// - `401 Unauthorized`: Sesión inválida o sin rol administrador
/// - `404 Not Found`: Publicidad no encontrada
#[put("/publicidades/cambiar-estado/{id}")]
async fn moderate_advertising(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    data: web::Json<CambioEstado>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar_administrador(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de publicidad inválido".to_string()))?;

    let estado = estado_para_transicion(data.aprobar, data.motivo.as_deref())?;

    let result = repo
        .publicidades()
        .update_one(doc! { "_id": id }, doc! { "$set": estado.a_documento_set() })
        .await
        .map_err(|e| AppError::database("cambiar_estado_publicidad", e))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Publicidad no encontrada".to_string()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Estado de la publicidad actualizado",
        "id": id.to_hex(),
        "estado": estado.nombre()
    })))
}

/// Incrementa el contador de visualizaciones
///
/// Endpoint anónimo: lo llaman los clientes al mostrar la publicidad.
/// El contador solo crece.
#[put("/publicidades/incrementar-visualizacion/{id}")]
async fn increment_views(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de publicidad inválido".to_string()))?;

    let result = repo
        .publicidades()
        .update_one(doc! { "_id": id }, doc! { "$inc": { "visualizaciones": 1 } })
        .await
        .map_err(|e| AppError::database("incrementar_visualizacion", e))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Publicidad no encontrada".to_string()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Visualización registrada",
        "id": id.to_hex()
    })))
}

/// Sirve la imagen de la publicidad en crudo
///
/// El content-type se detecta por los magic bytes y la respuesta es
/// cacheable por una hora.
#[get("/publicidades/{id}/imagen-raw")]
async fn get_advertising_image(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de publicidad inválido".to_string()))?;

    let publicidad = repo
        .publicidades()
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_publicidad", e))?
        .ok_or(AppError::NotFound("Publicidad no encontrada".to_string()))?;

    let imagen = publicidad
        .imagen
        .ok_or(AppError::NotFound("La publicidad no tiene imagen".to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type(tipo_contenido(&imagen.bytes))
        .insert_header(("Cache-Control", "public, max-age=3600"))
        .body(imagen.bytes))
}

/// Elimina una publicidad sin restricción de estado
#[delete("/publicidades/eliminar/{id}")]
async fn delete_advertising(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de publicidad inválido".to_string()))?;

    let result = repo
        .publicidades()
        .delete_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("eliminar_publicidad", e))?;

    if result.deleted_count == 0 {
        return Err(AppError::NotFound("Publicidad no encontrada".to_string()));
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Carga publicidades según el filtro dado
async fn cargar_publicidades(
    repo: &MongoRepo,
    filtro: mongodb::bson::Document,
) -> AppResult<Vec<Publicidad>> {
    let mut cursor = repo
        .publicidades()
        .find(filtro)
        .await
        .map_err(|e| AppError::database("listar_publicidades", e))?;

    let mut resultados = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let publicidad = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando publicidad: {}", e)))?;
        resultados.push(publicidad);
    }
    Ok(resultados)
}

/// Configura las rutas relacionadas con publicidades
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_advertising);
    cfg.service(get_advertisements);
    cfg.service(get_advertising_by_id);
    cfg.service(get_advertising_by_shop_name);
    cfg.service(moderate_advertising);
    cfg.service(increment_views);
    cfg.service(get_advertising_image);
    cfg.service(delete_advertising);
}
