//! # Configuración de la aplicación
//!
//! Toda la configuración se carga desde variables de entorno (archivo `.env`
//! en desarrollo). Las listas de validación (dominios de correo permitidos,
//! palabras prohibidas en reseñas) también viven acá: son datos inyectados,
//! no constantes del código, así se pueden cambiar por despliegue.

use std::env;

/// Configuración del emisor de credenciales de sesión (JWT HS256)
#[derive(Debug, Clone)]
pub struct ConfigJwt {
    pub secreto: String,
    pub emisor: String,
    pub audiencia: String,
    pub ttl_segundos: u64,
}

/// Configuración del proveedor de pagos
#[derive(Debug, Clone)]
pub struct ConfigPagos {
    /// Access token privado del proveedor
    pub access_token: String,
    /// Secreto compartido para validar firmas de webhook.
    /// Si falta, la validación de firma se omite (modo débil para desarrollo).
    pub webhook_secret: Option<String>,
    /// URL base de la API del proveedor (se sobreescribe en tests)
    pub base_url: String,
}

/// Configuración completa de la aplicación
#[derive(Debug, Clone)]
pub struct Configuracion {
    pub bind_address: String,
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub cors_origenes: Vec<String>,
    pub jwt: ConfigJwt,
    /// Client IDs de Google aceptados como audiencia del id_token
    pub google_client_ids: Vec<String>,
    pub pagos: ConfigPagos,
    /// URL del frontend web (callbacks de pago web)
    pub app_web_url: String,
    /// URL pública de esta API (notification_url del webhook)
    pub app_api_url: String,
    /// Dominios de correo aceptados al registrar usuarios y comercios.
    /// Lista vacía = sin restricción.
    pub correo_dominios_permitidos: Vec<String>,
    /// Palabras no admitidas en comentarios de reseñas
    pub palabras_prohibidas: Vec<String>,
}

impl Configuracion {
    /// Carga la configuración desde el entorno, con defaults de desarrollo
    pub fn desde_entorno() -> Configuracion {
        Configuracion {
            bind_address: env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            mongodb_uri: env::var("MONGODB_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            mongodb_database: env::var("MONGODB_DATABASE")
                .unwrap_or_else(|_| "salidas".to_string()),
            cors_origenes: lista_desde_entorno("CORS_ORIGENES"),
            jwt: ConfigJwt {
                secreto: env::var("JWT_SECRETO")
                    .unwrap_or_else(|_| "secreto-solo-desarrollo".to_string()),
                emisor: env::var("JWT_EMISOR")
                    .unwrap_or_else(|_| "salidas-api".to_string()),
                audiencia: env::var("JWT_AUDIENCIA")
                    .unwrap_or_else(|_| "salidas-clientes".to_string()),
                ttl_segundos: env::var("JWT_TTL_SEGUNDOS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(86_400),
            },
            google_client_ids: lista_desde_entorno("GOOGLE_CLIENT_IDS"),
            pagos: ConfigPagos {
                access_token: env::var("MP_ACCESS_TOKEN").unwrap_or_default(),
                webhook_secret: env::var("MP_WEBHOOK_SECRET")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                base_url: env::var("MP_BASE_URL")
                    .unwrap_or_else(|_| "https://api.mercadopago.com".to_string()),
            },
            app_web_url: env::var("APP_WEB_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            app_api_url: env::var("APP_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            correo_dominios_permitidos: lista_desde_entorno("CORREO_DOMINIOS_PERMITIDOS"),
            palabras_prohibidas: lista_desde_entorno("PALABRAS_PROHIBIDAS"),
        }
    }
}

/// Parsea una variable de entorno como lista separada por comas.
/// Entradas vacías se descartan; variable ausente = lista vacía.
fn lista_desde_entorno(clave: &str) -> Vec<String> {
    env::var(clave)
        .map(|v| parsear_lista(&v))
        .unwrap_or_default()
}

fn parsear_lista(valor: &str) -> Vec<String> {
    valor
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsea_lista_separada_por_comas() {
        let lista = parsear_lista("gmail.com, hotmail.com,outlook.com");
        assert_eq!(lista, vec!["gmail.com", "hotmail.com", "outlook.com"]);
    }

    #[test]
    fn descarta_entradas_vacias() {
        let lista = parsear_lista(" , gmail.com,, ");
        assert_eq!(lista, vec!["gmail.com"]);
    }

    #[test]
    fn cadena_vacia_produce_lista_vacia() {
        assert!(parsear_lista("").is_empty());
    }
}
