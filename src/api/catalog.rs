//! Catálogos de solo lectura que consumen los clientes para armar
//! formularios: tipos de comercio y roles de usuario.

use actix_web::{get, web, HttpResponse, Responder};
use mongodb::bson::doc;
use serde::Serialize;

use super::{AppError, AppResult};
use crate::db::MongoRepo;

#[derive(Serialize)]
struct CatalogoResponse {
    id: String,
    descripcion: String,
    activo: bool,
}

/// Lista los tipos de comercio
#[get("/tipos-comercio/listado")]
async fn list_shop_types(repo: web::Data<MongoRepo>) -> AppResult<impl Responder> {
    let mut cursor = repo
        .tipos_comercio()
        .find(doc! {})
        .await
        .map_err(|e| AppError::database("listar_tipos_comercio", e))?;

    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let tipo = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando tipo: {}", e)))?;
        results.push(CatalogoResponse {
            id: tipo.id.map(|id| id.to_hex()).unwrap_or_default(),
            descripcion: tipo.descripcion,
            activo: tipo.activo,
        });
    }

    Ok(HttpResponse::Ok().json(results))
}

/// Lista los roles de usuario
#[get("/roles-usuario/listado")]
async fn list_user_roles(repo: web::Data<MongoRepo>) -> AppResult<impl Responder> {
    let mut cursor = repo
        .roles_usuario()
        .find(doc! {})
        .await
        .map_err(|e| AppError::database("listar_roles", e))?;

    let mut results = Vec::new();
    while cursor
        .advance()
        .await
        .map_err(|e| AppError::Internal(format!("Error iterando cursor: {}", e)))?
    {
        let rol = cursor
            .deserialize_current()
            .map_err(|e| AppError::Internal(format!("Error deserializando rol: {}", e)))?;
        results.push(CatalogoResponse {
            id: rol.id.map(|id| id.to_hex()).unwrap_or_default(),
            descripcion: rol.descripcion,
            activo: rol.activo,
        });
    }

    Ok(HttpResponse::Ok().json(results))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_shop_types);
    cfg.service(list_user_roles);
}
