//! # API de Comercios
//!
//! Alta, búsqueda, moderación y baja de comercios. El alta valida el dígito
//! verificador del CUIT y su unicidad (incluye comercios históricos). Un
//! comercio nace inactivo a la espera de moderación; el motivo de rechazo
//! solo tiene sentido mientras está inactivo.

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use base64::Engine as _;
use chrono::NaiveTime;
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{doc, oid::ObjectId, Binary, Bson};
use serde::{Deserialize, Serialize};

use super::user::usuario_activo;
use super::{AppError, AppResult, ErrorLogExt, ResultExt};
use crate::auth::{autorizar, autorizar_administrador};
use crate::config::Configuracion;
use crate::db::{Comercio, MongoRepo};
use crate::domain::cuit::validar_cuit;
use crate::domain::images::tipo_contenido;
use crate::domain::rules::{estado_para_transicion, validar_dominio_correo};
use crate::domain::EstadoAprobacion;

#[derive(Deserialize)]
struct CrearComercio {
    nombre: String,
    /// CUIT de 11 dígitos sin guiones
    cuit: String,
    direccion: String,
    correo: String,
    telefono: String,
    capacidad: i32,
    mesas: i32,
    genero_musical: Option<String>,
    /// "HH:MM"
    hora_ingreso: Option<String>,
    hora_cierre: Option<String>,
    /// Imagen codificada en base64
    foto: Option<String>,
    id_usuario: String,
    id_tipo_comercio: String,
}

#[derive(Deserialize)]
struct ActualizarComercio {
    id: String,
    nombre: String,
    cuit: String,
    direccion: String,
    correo: String,
    telefono: String,
    capacidad: i32,
    mesas: i32,
    genero_musical: Option<String>,
    hora_ingreso: Option<String>,
    hora_cierre: Option<String>,
    foto: Option<String>,
    id_usuario: String,
    id_tipo_comercio: String,
}

#[derive(Deserialize)]
struct CambioEstado {
    aprobar: bool,
    motivo: Option<String>,
}

#[derive(Serialize)]
struct ComercioResponse {
    id: String,
    nombre: String,
    cuit: String,
    direccion: String,
    correo: String,
    telefono: String,
    capacidad: i32,
    mesas: i32,
    genero_musical: Option<String>,
    hora_ingreso: Option<String>,
    hora_cierre: Option<String>,
    tiene_foto: bool,
    activo: bool,
    motivo_rechazo: Option<String>,
    id_usuario: String,
    id_tipo_comercio: String,
    fecha_creacion: i64,
}

impl From<Comercio> for ComercioResponse {
    fn from(comercio: Comercio) -> Self {
        ComercioResponse {
            id: comercio.id.map(|id| id.to_hex()).unwrap_or_default(),
            nombre: comercio.nombre,
            cuit: comercio.cuit,
            direccion: comercio.direccion,
            correo: comercio.correo,
            telefono: comercio.telefono,
            capacidad: comercio.capacidad,
            mesas: comercio.mesas,
            genero_musical: comercio.genero_musical,
            hora_ingreso: comercio.hora_ingreso,
            hora_cierre: comercio.hora_cierre,
            tiene_foto: comercio.foto.is_some(),
            activo: comercio.activo,
            motivo_rechazo: comercio.motivo_rechazo,
            id_usuario: comercio.id_usuario.to_hex(),
            id_tipo_comercio: comercio.id_tipo_comercio.to_hex(),
            fecha_creacion: comercio.fecha_creacion,
        }
    }
}

/// Valida y parsea una hora en formato HH:MM
fn validate_time(time_str: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(time_str, "%H:%M")
        .map_err(|_| AppError::Validation("Formato de hora inválido, use HH:MM".to_string()))
}

/// Decodifica una imagen base64 a binario BSON
pub(crate) fn decodificar_foto(foto: &str) -> AppResult<Binary> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(foto)
        .map_err_validation("La imagen no es base64 válido")?;
    Ok(Binary {
        subtype: BinarySubtype::Generic,
        bytes,
    })
}

/// Busca un comercio y verifica que esté activo
///
/// # Errores
/// - `Validation`: El comercio no existe o está inactivo
pub async fn comercio_activo(repo: &MongoRepo, id: ObjectId) -> AppResult<Comercio> {
    let comercio = repo
        .comercios()
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_comercio", e))?;

    match comercio {
        Some(c) if c.activo => Ok(c),
        _ => Err(AppError::Validation(
            "El comercio no existe o está inactivo".to_string(),
        )),
    }
}

/// Devuelve los IDs de comercios cuyo nombre contiene el substring
/// (sin distinguir mayúsculas)
pub async fn ids_comercios_por_nombre(
    repo: &MongoRepo,
    nombre: &str,
) -> AppResult<Vec<ObjectId>> {
    let mut cursor = repo
        .comercios()
        .find(doc! { "nombre": { "$regex": regex_escapado(nombre), "$options": "i" } })
        .await
        .map_err(|e| AppError::database("buscar_comercios_nombre", e))?;

    let mut ids = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let comercio = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando comercio: {}", e)))?;
        if let Some(id) = comercio.id {
            ids.push(id);
        }
    }
    Ok(ids)
}

/// Escapa los metacaracteres de regex del término de búsqueda
pub(crate) fn regex_escapado(termino: &str) -> String {
    let mut escapado = String::with_capacity(termino.len());
    for c in termino.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escapado.push('\\');
        }
        escapado.push(c);
    }
    escapado
}

/// Registra un nuevo comercio (nace inactivo, pendiente de moderación)
///
/// # Validaciones
/// - Nombre no vacío
/// - CUIT de 11 dígitos con dígito verificador correcto, único en el sistema
/// - Dominio de correo contra la lista configurada
/// - Horarios en formato HH:MM si se envían
/// - El dueño debe existir y estar activo
///
/// # Errores
/// - `400 Bad Request`: Validación o CUIT duplicado
/// - `401 Unauthorized`: Sesión inválida
#[post("/comercios/crear")]
async fn create_shop(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    data: web::Json<CrearComercio>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    if data.nombre.trim().is_empty() {
        return Err(AppError::Validation("El nombre del comercio es requerido".to_string()));
    }

    validar_cuit(&data.cuit)?;
    validar_dominio_correo(&data.correo, &config.correo_dominios_permitidos)?;

    if let Some(hora) = &data.hora_ingreso {
        validate_time(hora)?;
    }
    if let Some(hora) = &data.hora_cierre {
        validate_time(hora)?;
    }

    let id_usuario = ObjectId::parse_str(&data.id_usuario)
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;
    let id_tipo_comercio = ObjectId::parse_str(&data.id_tipo_comercio)
        .map_err(|_| AppError::Validation("ID de tipo de comercio inválido".to_string()))?;

    usuario_activo(repo.get_ref(), id_usuario).await?;

    let comercios = repo.comercios();

    // El CUIT es único incluso contra comercios dados de baja lógica
    let existente = comercios
        .find_one(doc! { "cuit": &data.cuit })
        .await
        .log_error_context("checking if shop exists")
        .map_err(|e| AppError::database("check_cuit_duplicado", e))?;

    if existente.is_some() {
        return Err(AppError::Conflict("Ya existe un comercio con ese CUIT".to_string()));
    }

    let foto = match &data.foto {
        Some(f) => Some(decodificar_foto(f)?),
        None => None,
    };

    let comercio = Comercio {
        id: None,
        nombre: data.nombre.clone(),
        cuit: data.cuit.clone(),
        direccion: data.direccion.clone(),
        correo: data.correo.clone(),
        telefono: data.telefono.clone(),
        capacidad: data.capacidad,
        mesas: data.mesas,
        genero_musical: data.genero_musical.clone(),
        hora_ingreso: data.hora_ingreso.clone(),
        hora_cierre: data.hora_cierre.clone(),
        foto,
        activo: false,
        motivo_rechazo: None,
        id_usuario,
        id_tipo_comercio,
        fecha_creacion: MongoRepo::current_timestamp(),
    };

    let result = comercios
        .insert_one(comercio)
        .await
        .log_error_context("inserting new shop")
        .map_err(|e| AppError::database("crear_comercio", e))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Comercio creado correctamente",
        "id": result.inserted_id.as_object_id().map(|id| id.to_hex())
    })))
}

/// Lista todos los comercios
#[get("/comercios/listado")]
async fn list_shops(repo: web::Data<MongoRepo>) -> AppResult<impl Responder> {
    let mut cursor = repo
        .comercios()
        .find(doc! {})
        .await
        .log_error_context("listing all shops")
        .map_err(|e| AppError::database("listar_comercios", e))?;

    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let comercio = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando comercio: {}", e)))?;
        results.push(ComercioResponse::from(comercio));
    }

    Ok(HttpResponse::Ok().json(results))
}

/// Busca un comercio por ID
#[get("/comercios/buscar-id/{id}")]
async fn get_shop_by_id(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;

    let comercio = repo
        .comercios()
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_comercio", e))?
        .ok_or(AppError::NotFound("Comercio no encontrado".to_string()))?;

    Ok(HttpResponse::Ok().json(ComercioResponse::from(comercio)))
}

/// Busca comercios por nombre (substring, sin distinguir mayúsculas)
#[get("/comercios/buscar-nombre/{nombre}")]
async fn get_shops_by_name(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let nombre = path.into_inner();
    let mut cursor = repo
        .comercios()
        .find(doc! { "nombre": { "$regex": regex_escapado(&nombre), "$options": "i" } })
        .await
        .map_err(|e| AppError::database("buscar_comercios_nombre", e))?;

    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let comercio = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando comercio: {}", e)))?;
        results.push(ComercioResponse::from(comercio));
    }

    Ok(HttpResponse::Ok().json(results))
}

/// Lista los comercios de un usuario
#[get("/comercios/buscar-por-usuario/{id}")]
async fn get_shops_per_user(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let id_usuario = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;

    let mut cursor = repo
        .comercios()
        .find(doc! { "id_usuario": id_usuario })
        .await
        .map_err(|e| AppError::database("comercios_por_usuario", e))?;

    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let comercio = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando comercio: {}", e)))?;
        results.push(ComercioResponse::from(comercio));
    }

    Ok(HttpResponse::Ok().json(results))
}

/// Reemplaza un comercio completo. El estado de moderación y la fecha de
/// creación se conservan; la foto solo cambia si se envía una nueva.
#[put("/comercios/actualizar/{id}")]
async fn update_shop(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    data: web::Json<ActualizarComercio>,
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
        .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;

    validar_cuit(&data.cuit)?;
    validar_dominio_correo(&data.correo, &config.correo_dominios_permitidos)?;

    if let Some(hora) = &data.hora_ingreso {
        validate_time(hora)?;
    }
    if let Some(hora) = &data.hora_cierre {
        validate_time(hora)?;
    }

    let id_usuario = ObjectId::parse_str(&data.id_usuario)
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;
    let id_tipo_comercio = ObjectId::parse_str(&data.id_tipo_comercio)
        .map_err(|_| AppError::Validation("ID de tipo de comercio inválido".to_string()))?;

    let comercios = repo.comercios();

    // Unicidad de CUIT excluyendo al propio comercio
    let duplicado = comercios
        .find_one(doc! { "cuit": &data.cuit, "_id": { "$ne": id } })
        .await
        .map_err(|e| AppError::database("check_cuit_duplicado", e))?;

    if duplicado.is_some() {
        return Err(AppError::Conflict("Ya existe un comercio con ese CUIT".to_string()));
    }

    let actual = comercios
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_comercio", e))?
        .ok_or(AppError::NotFound("Comercio no encontrado".to_string()))?;

    let foto = match &data.foto {
        Some(f) => Some(decodificar_foto(f)?),
        None => actual.foto,
    };

    let reemplazo = Comercio {
        id: Some(id),
        nombre: data.nombre.clone(),
        cuit: data.cuit.clone(),
        direccion: data.direccion.clone(),
        correo: data.correo.clone(),
        telefono: data.telefono.clone(),
        capacidad: data.capacidad,
        mesas: data.mesas,
        genero_musical: data.genero_musical.clone(),
        hora_ingreso: data.hora_ingreso.clone(),
        hora_cierre: data.hora_cierre.clone(),
        foto,
        activo: actual.activo,
        motivo_rechazo: actual.motivo_rechazo,
        id_usuario,
        id_tipo_comercio,
        fecha_creacion: actual.fecha_creacion,
    };

    let result = comercios
        .replace_one(doc! { "_id": id }, reemplazo)
        .await
        .map_err(|e| AppError::database("actualizar_comercio", e))?;

    // Conflicto optimista: re-chequear existencia antes de responder
    if result.matched_count == 0 {
        let existe = comercios
            .find_one(doc! { "_id": id })
            .await
            .map_err(|e| AppError::database("reexistencia_comercio", e))?;
        return match existe {
            None => Err(AppError::NotFound("Comercio no encontrado".to_string())),
            Some(_) => Err(AppError::Conflict(
                "El comercio fue modificado por otra operación".to_string(),
            )),
        };
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Aprueba o rechaza un comercio (moderación, admin)
///
/// Aprobar activa el comercio y limpia el motivo; rechazar lo deja
/// inactivo con el motivo indicado.
#[put("/comercios/cambiar-estado/{id}")]
async fn moderate_shop(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    data: web::Json<CambioEstado>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar_administrador(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;

    // La misma regla de motivos que el resto de las moderaciones
    let estado = estado_para_transicion(data.aprobar, data.motivo.as_deref())?;

    let set = match &estado {
        EstadoAprobacion::Aprobada => doc! { "activo": true, "motivo_rechazo": Bson::Null },
        EstadoAprobacion::Rechazada(motivo) => doc! { "activo": false, "motivo_rechazo": motivo },
        EstadoAprobacion::Pendiente => doc! { "activo": false, "motivo_rechazo": Bson::Null },
    };

    let result = repo
        .comercios()
        .update_one(doc! { "_id": id }, doc! { "$set": set })
        .await
        .map_err(|e| AppError::database("cambiar_estado_comercio", e))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Comercio no encontrado".to_string()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Estado del comercio actualizado",
        "id": id.to_hex(),
        "activo": data.aprobar
    })))
}

/// Elimina un comercio junto con sus reservas, reseñas y publicidades
#[delete("/comercios/eliminar/{id}")]
async fn delete_shop(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;

    let existia = repo.eliminar_comercio_en_cascada(id).await?;

    if !existia {
        return Err(AppError::NotFound("Comercio no encontrado".to_string()));
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Sirve la foto del comercio en crudo
///
/// El content-type se detecta por los magic bytes de la imagen y la
/// respuesta es cacheable por una hora.
#[get("/comercios/{id}/imagen-raw")]
async fn get_shop_image(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de comercio inválido".to_string()))?;

    let comercio = repo
        .comercios()
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_comercio", e))?
        .ok_or(AppError::NotFound("Comercio no encontrado".to_string()))?;

    let foto = comercio
        .foto
        .ok_or(AppError::NotFound("El comercio no tiene foto".to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type(tipo_contenido(&foto.bytes))
        .insert_header(("Cache-Control", "public, max-age=3600"))
        .body(foto.bytes))
}

/// Configura las rutas relacionadas con comercios
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_shop);
    cfg.service(list_shops);
    cfg.service(get_shop_by_id);
    cfg.service(get_shops_by_name);
    cfg.service(get_shops_per_user);
    cfg.service(update_shop);
    cfg.service(moderate_shop);
    cfg.service(delete_shop);
    cfg.service(get_shop_image);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapa_metacaracteres_de_regex() {
        assert_eq!(regex_escapado("bar.io"), "bar\\.io");
        assert_eq!(regex_escapado("a+b"), "a\\+b");
        assert_eq!(regex_escapado("normal"), "normal");
    }

    #[test]
    fn hora_valida_e_invalida() {
        assert!(validate_time("20:30").is_ok());
        assert!(validate_time("25:00").is_err());
        assert!(validate_time("20.30").is_err());
        assert!(validate_time("").is_err());
    }
}
