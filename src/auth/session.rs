//! # Credenciales de sesión
//!
//! Una vez verificada la identidad contra el proveedor externo, el sistema
//! emite su propio token de sesión firmado (HS256) con el id del sujeto,
//! su correo y su rol. Las rutas protegidas validan ese token, nunca el
//! id_token de Google.

use actix_web::HttpRequest;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::{AppError, AppResult};
use crate::config::ConfigJwt;

/// Claims del token de sesión
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Id del usuario (ObjectId en hex)
    pub sub: String,
    pub correo: String,
    /// Descripción del rol ("usuario", "administrador")
    pub rol: String,
    pub exp: u64,
    pub iss: String,
    pub aud: String,
}

impl Claims {
    pub fn es_administrador(&self) -> bool {
        self.rol == "administrador"
    }
}

/// Emite un token de sesión para el usuario indicado
pub fn emitir_token(config: &ConfigJwt, sub: &str, correo: &str, rol: &str) -> AppResult<String> {
    let ahora = chrono::Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: sub.to_string(),
        correo: correo.to_string(),
        rol: rol.to_string(),
        exp: ahora + config.ttl_segundos,
        iss: config.emisor.clone(),
        aud: config.audiencia.clone(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secreto.as_bytes()),
    )
    .map_err(|e| AppError::internal_trace(&format!("Error emitiendo token: {}", e), None))
}

/// Valida un token de sesión y devuelve sus claims
pub fn validar_token(config: &ConfigJwt, token: &str) -> AppResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[&config.audiencia]);
    validation.set_issuer(&[&config.emisor]);

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secreto.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized("Token de sesión inválido".to_string()))
}

/// Extrae el token Bearer del header Authorization
///
/// # Errores
/// - `Unauthorized`: Si falta el header, es inválido o no tiene el formato correcto
pub fn extract_token(req: &HttpRequest) -> AppResult<String> {
    let auth_header = req
        .headers()
        .get("authorization")
        .ok_or(AppError::Unauthorized("Falta header Authorization".to_string()))?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Header Authorization inválido".to_string()))?;

    if !auth_str.starts_with("Bearer ") {
        return Err(AppError::Unauthorized("Formato de token inválido".to_string()));
    }

    Ok(auth_str[7..].to_string())
}

/// Valida la sesión del request y devuelve los claims
pub fn autorizar(req: &HttpRequest, config: &ConfigJwt) -> AppResult<Claims> {
    let token = extract_token(req)?;
    validar_token(config, &token)
}

/// Como [`autorizar`] pero exige rol administrador (moderación)
pub fn autorizar_administrador(req: &HttpRequest, config: &ConfigJwt) -> AppResult<Claims> {
    let claims = autorizar(req, config)?;
    if !claims.es_administrador() {
        return Err(AppError::unauthorized_operation(
            "moderación",
            "se requiere rol administrador",
        ));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_prueba() -> ConfigJwt {
        ConfigJwt {
            secreto: "secreto-de-test".to_string(),
            emisor: "salidas-api".to_string(),
            audiencia: "salidas-clientes".to_string(),
            ttl_segundos: 3600,
        }
    }

    #[test]
    fn ida_y_vuelta_del_token() {
        let config = config_prueba();
        let token = emitir_token(&config, "abc123", "ana@gmail.com", "usuario").unwrap();
        let claims = validar_token(&config, &token).unwrap();
        assert_eq!(claims.sub, "abc123");
        assert_eq!(claims.correo, "ana@gmail.com");
        assert_eq!(claims.rol, "usuario");
        assert!(!claims.es_administrador());
    }

    #[test]
    fn audiencia_distinta_se_rechaza() {
        let config = config_prueba();
        let token = emitir_token(&config, "abc", "a@b.com", "usuario").unwrap();

        let mut otra = config_prueba();
        otra.audiencia = "otra-app".to_string();
        assert!(validar_token(&otra, &token).is_err());
    }

    #[test]
    fn secreto_distinto_se_rechaza() {
        let config = config_prueba();
        let token = emitir_token(&config, "abc", "a@b.com", "usuario").unwrap();

        let mut otra = config_prueba();
        otra.secreto = "otro-secreto".to_string();
        assert!(validar_token(&otra, &token).is_err());
    }

    #[test]
    fn token_adulterado_se_rechaza() {
        let config = config_prueba();
        let mut token = emitir_token(&config, "abc", "a@b.com", "usuario").unwrap();
        token.push('x');
        assert!(validar_token(&config, &token).is_err());
    }

    #[test]
    fn rol_administrador() {
        let config = config_prueba();
        let token = emitir_token(&config, "abc", "a@b.com", "administrador").unwrap();
        let claims = validar_token(&config, &token).unwrap();
        assert!(claims.es_administrador());
    }
}
