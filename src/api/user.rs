//! # API de Usuarios
//!
//! Este módulo maneja todas las operaciones relacionadas con usuarios:
//! - Inicio de sesión y registro con Google (el proveedor verifica el
//!   id_token; el sistema emite su propia credencial de sesión)
//! - Listado y búsquedas
//! - Actualización de perfil
//! - Baja lógica (desactivar) y baja física con cascada
//!
//! La baja normal es lógica: `activo = false`. La eliminación física borra
//! también los comercios del usuario con todos sus dependientes.

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder};
use mongodb::bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{AppError, AppResult, ErrorLogExt};
use crate::auth::session::emitir_token;
use crate::auth::{autorizar, autorizar_administrador, ClienteIdentidad};
use crate::config::Configuracion;
use crate::db::{MongoRepo, Usuario};
use crate::domain::rules::validar_dominio_correo;

#[derive(Deserialize)]
struct CredencialGoogle {
    /// id_token emitido por Google en el cliente
    id_token: String,
}

#[derive(Deserialize)]
struct ActualizarUsuario {
    nombre_usuario: String,
    correo: String,
    telefono: Option<String>,
    /// Cambio de rol opcional (ObjectId como string)
    id_rol: Option<String>,
}

#[derive(Serialize)]
struct UsuarioResponse {
    id: String,
    nombre_usuario: String,
    correo: String,
    telefono: Option<String>,
    activo: bool,
    motivo_rechazo: Option<String>,
    id_rol: String,
    fecha_creacion: i64,
}

impl From<Usuario> for UsuarioResponse {
    fn from(usuario: Usuario) -> Self {
        UsuarioResponse {
            id: usuario.id.map(|id| id.to_hex()).unwrap_or_default(),
            nombre_usuario: usuario.nombre_usuario,
            correo: usuario.correo,
            telefono: usuario.telefono,
            activo: usuario.activo,
            motivo_rechazo: usuario.motivo_rechazo,
            id_rol: usuario.id_rol.to_hex(),
            fecha_creacion: usuario.fecha_creacion,
        }
    }
}

/// Busca un usuario y verifica que esté activo
///
/// # Errores
/// - `Validation`: El usuario no existe o está inactivo
pub async fn usuario_activo(repo: &MongoRepo, id: ObjectId) -> AppResult<Usuario> {
    let usuario = repo
        .usuarios()
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_usuario", e))?;

    match usuario {
        Some(u) if u.activo => Ok(u),
        _ => Err(AppError::Validation(
            "El usuario no existe o está inactivo".to_string(),
        )),
    }
}

/// Descripción del rol de un usuario, para embeber en el token de sesión
async fn descripcion_rol(repo: &MongoRepo, id_rol: ObjectId) -> AppResult<String> {
    let rol = repo
        .roles_usuario()
        .find_one(doc! { "_id": id_rol })
        .await
        .map_err(|e| AppError::database("buscar_rol", e))?;

    Ok(rol.map(|r| r.descripcion).unwrap_or_else(|| "usuario".to_string()))
}

/// Inicia sesión con una cuenta de Google ya registrada
///
/// # Flujo
/// 1. El id_token se verifica contra el proveedor de identidad
/// 2. Se busca el usuario por su UID externo
/// 3. Si existe, se emite la credencial de sesión propia
///
/// # Respuesta
/// ```json
/// {
///   "message": "Inicio de sesión exitoso",
///   "token": "<jwt>",
///   "usuario": { ... }
/// }
/// ```
///
/// # Errores
/// - `400 Bad Request`: El usuario no está registrado
/// - `401 Unauthorized`: id_token inválido
#[post("/usuarios/iniciar-sesion")]
async fn sign_in_with_google(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    identidad: web::Data<ClienteIdentidad>,
    data: web::Json<CredencialGoogle>,
) -> AppResult<impl Responder> {
    let verificada = identidad.verificar_id_token(&data.id_token).await?;

    let usuario = repo
        .usuarios()
        .find_one(doc! { "uid_externo": &verificada.uid })
        .await
        .log_error_context("looking up user by external uid")
        .map_err(|e| AppError::database("buscar_por_uid", e))?;

    let usuario = match usuario {
        Some(u) => u,
        None => {
            return Err(AppError::Validation(
                "Usuario no registrado, debe registrarse primero".to_string(),
            ))
        }
    };

    if !usuario.activo {
        return Err(AppError::Unauthorized("La cuenta está deshabilitada".to_string()));
    }

    let rol = descripcion_rol(repo.get_ref(), usuario.id_rol).await?;
    let sub = usuario.id.map(|id| id.to_hex()).unwrap_or_default();
    let token = emitir_token(&config.jwt, &sub, &usuario.correo, &rol)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Inicio de sesión exitoso",
        "token": token,
        "usuario": UsuarioResponse::from(usuario)
    })))
}

/// Registra un usuario nuevo a partir de su cuenta de Google
///
/// El nombre de usuario inicial es la parte local del correo. El dominio
/// del correo se valida contra la lista configurada.
///
/// # Errores
/// - `400 Bad Request`: UID o correo ya registrados, o dominio no permitido
/// - `401 Unauthorized`: id_token inválido
#[post("/usuarios/registrarse")]
async fn sign_up_with_google(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    identidad: web::Data<ClienteIdentidad>,
    data: web::Json<CredencialGoogle>,
) -> AppResult<impl Responder> {
    let verificada = identidad.verificar_id_token(&data.id_token).await?;

    validar_dominio_correo(&verificada.correo, &config.correo_dominios_permitidos)?;

    let usuarios = repo.usuarios();

    let existente = usuarios
        .find_one(doc! {
            "$or": [
                { "uid_externo": &verificada.uid },
                { "correo": &verificada.correo }
            ]
        })
        .await
        .log_error_context("checking if user exists")
        .map_err(|e| AppError::database("check_usuario_existe", e))?;

    if existente.is_some() {
        return Err(AppError::Conflict(
            "Ya existe una cuenta para ese usuario, debe iniciar sesión".to_string(),
        ));
    }

    let rol = repo.rol_por_defecto().await?;

    // Nombre visible de la cuenta de Google; si no viene, la parte
    // local del correo
    let nombre_usuario = verificada.nombre.clone().unwrap_or_else(|| {
        verificada
            .correo
            .split('@')
            .next()
            .unwrap_or(&verificada.correo)
            .to_string()
    });

    let usuario = Usuario {
        id: None,
        nombre_usuario,
        correo: verificada.correo.clone(),
        telefono: None,
        activo: true,
        motivo_rechazo: None,
        uid_externo: Some(verificada.uid.clone()),
        id_rol: rol.id.ok_or_else(|| {
            AppError::Internal("Catálogo de roles sin inicializar".to_string())
        })?,
        fecha_creacion: MongoRepo::current_timestamp(),
    };

    let result = usuarios
        .insert_one(usuario.clone())
        .await
        .log_error_context("inserting new user")
        .map_err(|e| AppError::database("registrar_usuario", e))?;

    let sub = result
        .inserted_id
        .as_object_id()
        .map(|id| id.to_hex())
        .unwrap_or_default();
    let token = emitir_token(&config.jwt, &sub, &usuario.correo, &rol.descripcion)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Registro exitoso",
        "token": token,
        "id": sub
    })))
}

/// Lista todos los usuarios
#[get("/usuarios/listado")]
async fn list_users(repo: web::Data<MongoRepo>) -> AppResult<impl Responder> {
    let mut cursor = repo
        .usuarios()
        .find(doc! {})
        .await
        .log_error_context("listing all users")
        .map_err(|e| AppError::database("listar_usuarios", e))?;

    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let usuario = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando usuario: {}", e)))?;
        results.push(UsuarioResponse::from(usuario));
    }

    Ok(HttpResponse::Ok().json(results))
}

/// Busca un usuario por ID
#[get("/usuarios/buscar-id/{id}")]
async fn get_user_by_id(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;

    let usuario = repo
        .usuarios()
        .find_one(doc! { "_id": id })
        .await
        .map_err(|e| AppError::database("buscar_usuario", e))?
        .ok_or(AppError::NotFound("Usuario no encontrado".to_string()))?;

    Ok(HttpResponse::Ok().json(UsuarioResponse::from(usuario)))
}

/// Busca usuarios por nombre (substring, sin distinguir mayúsculas)
#[get("/usuarios/buscar-nombre/{nombre}")]
async fn get_users_by_name(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let nombre = path.into_inner();
    let mut cursor = repo
        .usuarios()
        .find(doc! { "nombre_usuario": { "$regex": super::shop::regex_escapado(&nombre), "$options": "i" } })
        .await
        .map_err(|e| AppError::database("buscar_usuarios_nombre", e))?;

    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let usuario = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando usuario: {}", e)))?;
        results.push(UsuarioResponse::from(usuario));
    }

    Ok(HttpResponse::Ok().json(results))
}

/// Busca un usuario por correo exacto (sin distinguir mayúsculas)
#[get("/usuarios/buscar-email/{email}")]
async fn get_user_by_email(
    repo: web::Data<MongoRepo>,
    path: web::Path<String>,
) -> AppResult<impl Responder> {
    let email = path.into_inner();

    // Coincidencia exacta sin distinguir mayúsculas
    let patron = format!("^{}$", super::shop::regex_escapado(&email));
    let usuario = repo
        .usuarios()
        .find_one(doc! { "correo": { "$regex": patron, "$options": "i" } })
        .await
        .map_err(|e| AppError::database("buscar_por_correo", e))?
        .ok_or(AppError::NotFound("Usuario no encontrado".to_string()))?;

    Ok(HttpResponse::Ok().json(UsuarioResponse::from(usuario)))
}

/// Actualiza el perfil de un usuario
///
/// El nombre de usuario debe seguir siendo único (se excluye al propio
/// usuario del chequeo).
#[put("/usuarios/actualizar/{id}")]
async fn update_user(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    data: web::Json<ActualizarUsuario>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;

    if data.nombre_usuario.trim().is_empty() {
        return Err(AppError::Validation("El nombre de usuario es requerido".to_string()));
    }

    validar_dominio_correo(&data.correo, &config.correo_dominios_permitidos)?;

    let usuarios = repo.usuarios();

    // Unicidad del nombre de usuario excluyendo al propio usuario
    let duplicado = usuarios
        .find_one(doc! { "nombre_usuario": &data.nombre_usuario, "_id": { "$ne": id } })
        .await
        .map_err(|e| AppError::database("check_nombre_usuario", e))?;

    if duplicado.is_some() {
        return Err(AppError::Conflict("El nombre de usuario ya está en uso".to_string()));
    }

    let mut set = doc! {
        "nombre_usuario": &data.nombre_usuario,
        "correo": &data.correo,
        "telefono": data.telefono.as_deref(),
    };

    if let Some(id_rol) = &data.id_rol {
        let id_rol = ObjectId::parse_str(id_rol)
            .map_err(|_| AppError::Validation("ID de rol inválido".to_string()))?;
        set.insert("id_rol", id_rol);
    }

    let result = usuarios
        .update_one(doc! { "_id": id }, doc! { "$set": set })
        .await
        .map_err(|e| AppError::database("actualizar_usuario", e))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Usuario no encontrado".to_string()));
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Deshabilita un usuario (baja lógica)
///
/// El usuario deja de poder iniciar sesión, crear reservas o reseñas, y sus
/// reservas desaparecen de los listados.
#[post("/usuarios/desactivar/{id}")]
async fn deactivate_user(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;

    let result = repo
        .usuarios()
        .update_one(doc! { "_id": id }, doc! { "$set": { "activo": false } })
        .await
        .map_err(|e| AppError::database("desactivar_usuario", e))?;

    if result.matched_count == 0 {
        return Err(AppError::NotFound("Usuario no encontrado".to_string()));
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Elimina un usuario con cascada (admin)
///
/// Borra sus comercios (cada uno con sus reservas, reseñas y publicidades)
/// y después sus propias reservas y reseñas.
#[delete("/usuarios/eliminar/{id}")]
async fn delete_user(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    path: web::Path<String>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar_administrador(&req, &config.jwt)?;

    let id = ObjectId::parse_str(&path.into_inner())
        .map_err(|_| AppError::Validation("ID de usuario inválido".to_string()))?;

    let existia = repo.eliminar_usuario_en_cascada(id).await?;

    if !existia {
        return Err(AppError::NotFound("Usuario no encontrado".to_string()));
    }

    Ok(HttpResponse::NoContent().finish())
}

/// Configura las rutas relacionadas con usuarios
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(sign_in_with_google);
    cfg.service(sign_up_with_google);
    cfg.service(list_users);
    cfg.service(get_user_by_id);
    cfg.service(get_users_by_name);
    cfg.service(get_user_by_email);
    cfg.service(update_user);
    cfg.service(deactivate_user);
    cfg.service(delete_user);
}
