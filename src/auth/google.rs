//! # Verificación de identidad con Google
//!
//! El id_token que manda el cliente se verifica contra el endpoint
//! `tokeninfo` de Google. Para este sistema el proveedor es una caja negra:
//! token → {uid, correo, nombre} o rechazo.

use reqwest::Client;
use serde::Deserialize;

use crate::api::{AppError, AppResult};

const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Identidad verificada devuelta por el proveedor
#[derive(Debug, Clone)]
pub struct IdentidadVerificada {
    pub uid: String,
    pub correo: String,
    pub nombre: Option<String>,
}

/// Respuesta cruda del endpoint tokeninfo
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    name: Option<String>,
    #[serde(default)]
    email_verified: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClienteIdentidad {
    http: Client,
    base_url: String,
    /// Client IDs propios aceptados como audiencia. Vacío = no se chequea
    /// (solo desarrollo).
    client_ids: Vec<String>,
}

impl ClienteIdentidad {
    pub fn new(client_ids: Vec<String>) -> Self {
        ClienteIdentidad {
            http: Client::new(),
            base_url: TOKENINFO_URL.to_string(),
            client_ids,
        }
    }

    /// Verifica un id_token de Google y devuelve la identidad validada
    pub async fn verificar_id_token(&self, id_token: &str) -> AppResult<IdentidadVerificada> {
        let respuesta = self
            .http
            .get(&self.base_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| {
                AppError::internal_trace(&format!("Error consultando a Google: {}", e), None)
            })?;

        if !respuesta.status().is_success() {
            return Err(AppError::Unauthorized("Token de Google inválido".to_string()));
        }

        let info: TokenInfo = respuesta.json().await.map_err(|e| {
            AppError::internal_trace(&format!("Respuesta de Google ilegible: {}", e), None)
        })?;

        validar_token_info(info, &self.client_ids)
    }
}

/// Chequeos sobre la respuesta del proveedor, separados del transporte
fn validar_token_info(
    info: TokenInfo,
    client_ids: &[String],
) -> AppResult<IdentidadVerificada> {
    if !client_ids.is_empty() && !client_ids.iter().any(|c| c == &info.aud) {
        return Err(AppError::Unauthorized(
            "El token no fue emitido para esta aplicación".to_string(),
        ));
    }

    if info.email_verified.as_deref() != Some("true") {
        return Err(AppError::Unauthorized(
            "El correo de la cuenta de Google no está verificado".to_string(),
        ));
    }

    let correo = info.email.filter(|c| !c.is_empty()).ok_or_else(|| {
        AppError::Unauthorized("No se pudo obtener el correo de la cuenta de Google".to_string())
    })?;

    Ok(IdentidadVerificada {
        uid: info.sub,
        correo,
        nombre: info.name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(aud: &str) -> TokenInfo {
        TokenInfo {
            aud: aud.to_string(),
            sub: "uid-123".to_string(),
            email: Some("ana@gmail.com".to_string()),
            name: Some("Ana".to_string()),
            email_verified: Some("true".to_string()),
        }
    }

    #[test]
    fn acepta_audiencia_propia() {
        let ids = vec!["mi-client-id".to_string()];
        let identidad = validar_token_info(info("mi-client-id"), &ids).unwrap();
        assert_eq!(identidad.uid, "uid-123");
        assert_eq!(identidad.correo, "ana@gmail.com");
    }

    #[test]
    fn rechaza_audiencia_ajena() {
        let ids = vec!["mi-client-id".to_string()];
        assert!(validar_token_info(info("otro-client-id"), &ids).is_err());
    }

    #[test]
    fn sin_client_ids_configurados_no_chequea_audiencia() {
        assert!(validar_token_info(info("cualquiera"), &[]).is_ok());
    }

    #[test]
    fn rechaza_correo_sin_verificar() {
        let mut i = info("x");
        i.email_verified = Some("false".to_string());
        assert!(validar_token_info(i, &[]).is_err());
    }

    #[test]
    fn rechaza_respuesta_sin_correo() {
        let mut i = info("x");
        i.email = None;
        assert!(validar_token_info(i, &[]).is_err());
    }
}
