//! # API de Pagos
//!
//! Tres endpoints alrededor del proveedor de pagos:
//!
//! - `crear-preferencia`: arma el checkout y devuelve la URL de pago
//! - `verificar-pago`: camino sincrónico; el cliente manda el id del pago
//!   y el sistema consulta al proveedor
//! - `webhook`: camino asincrónico; el proveedor empuja la notificación
//!
//! Los dos últimos compiten por marcar la misma publicidad como pagada y
//! convergen en [`confirmar_pago_aprobado`], que es idempotente. El webhook
//! responde siempre 200 (salvo firma inválida): si devolviera error el
//! proveedor reintentaría la notificación indefinidamente.

use actix_web::{post, web, HttpRequest, HttpResponse, Responder};
use mongodb::bson::{doc, oid::ObjectId};
use serde::Deserialize;
use serde_json::json;

use super::{AppError, AppResult, ErrorLogExt};
use crate::auth::autorizar;
use crate::config::Configuracion;
use crate::db::MongoRepo;
use crate::payments::client::BackUrls;
use crate::payments::signature::{evaluar_firma, VeredictoFirma};
use crate::payments::{confirmar_pago_aprobado, ClientePagos, ResultadoConfirmacion};

#[derive(Deserialize)]
struct PreferenciaRequest {
    titulo: String,
    precio: f64,
    /// Publicidad que se está pagando (ObjectId como string)
    id_publicidad: String,
    /// true = checkout desde la web, false = desde la app móvil
    #[serde(default)]
    es_web: bool,
}

#[derive(Deserialize)]
struct VerificarPagoRequest {
    /// Id del pago en el proveedor
    id_pago: String,
}

/// Notificación del proveedor. Solo interesa `data.id`; el resto del
/// cuerpo se ignora.
#[derive(Debug, Default, Deserialize)]
struct NotificacionWebhook {
    #[serde(default)]
    data: Option<DatosNotificacion>,
}

#[derive(Debug, Default, Deserialize)]
struct DatosNotificacion {
    /// Puede llegar como string o como número según la versión del proveedor
    id: Option<serde_json::Value>,
}

/// Normaliza el id de la notificación a texto
fn valor_a_texto(valor: &serde_json::Value) -> String {
    match valor {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

/// URLs de retorno del checkout según el origen del pago
fn construir_back_urls(es_web: bool, web_url: &str, id_publicidad: &str) -> BackUrls {
    if es_web {
        BackUrls {
            success: format!("{}/payment/callback?status=success", web_url),
            failure: format!("{}/payment/callback?status=failure", web_url),
            pending: format!("{}/payment/callback?status=pending", web_url),
        }
    } else {
        BackUrls {
            success: format!("salidas://payment/success?publicidad_id={}", id_publicidad),
            failure: format!("salidas://payment/failure?publicidad_id={}", id_publicidad),
            pending: format!("salidas://payment/pending?publicidad_id={}", id_publicidad),
        }
    }
}

/// Crea una preferencia de pago para una publicidad
///
/// La referencia externa que viaja al proveedor es el id de la publicidad
/// en hex; el proveedor la devuelve intacta y la conciliación la usa para
/// encontrar la publicidad.
///
/// # Respuesta
/// ```json
/// { "init_point": "https://...", "id": "preference-id" }
/// ```
///
/// # Errores
/// - `400 Bad Request`: Publicidad inexistente o datos inválidos
/// - `401 Unauthorized`: Sesión inválida
#[post("/pagos/crear-preferencia")]
async fn create_preference(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    pagos: web::Data<ClientePagos>,
    data: web::Json<PreferenciaRequest>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    if data.titulo.trim().is_empty() {
        return Err(AppError::Validation("El título es requerido".to_string()));
    }

    if data.precio <= 0.0 {
        return Err(AppError::Validation("El precio debe ser mayor a 0".to_string()));
    }

    let id_publicidad = ObjectId::parse_str(&data.id_publicidad)
        .map_err(|_| AppError::Validation("ID de publicidad inválido".to_string()))?;

    let publicidad = repo
        .publicidades()
        .find_one(doc! { "_id": id_publicidad })
        .await
        .map_err(|e| AppError::database("buscar_publicidad", e))?
        .ok_or(AppError::NotFound("Publicidad no encontrada".to_string()))?;

    if publicidad.pago {
        return Err(AppError::Conflict("La publicidad ya está pagada".to_string()));
    }

    let referencia = id_publicidad.to_hex();
    let back_urls = construir_back_urls(data.es_web, &config.app_web_url, &referencia);
    let notification_url = format!("{}/pagos/webhook", config.app_api_url);

    let preferencia = pagos
        .crear_preferencia(&data.titulo, data.precio, &referencia, back_urls, &notification_url)
        .await
        .log_error_context("creating payment preference")?;

    Ok(HttpResponse::Ok().json(json!({
        "init_point": preferencia.init_point,
        "id": preferencia.id
    })))
}

/// Verifica un pago de forma sincrónica
///
/// El cliente manda el id del pago que le devolvió el checkout; el sistema
/// consulta al proveedor y, si está aprobado, marca la publicidad como
/// pagada. Reintentar con un pago ya procesado no es un error.
///
/// # Respuesta
/// ```json
/// {
///   "success": true,
///   "message": "Pago verificado correctamente",
///   "id_publicidad": "507f1f77bcf86cd799439011",
///   "pago_realizado": true
/// }
/// ```
///
/// # Errores
/// - `400 Bad Request`: El pago no está aprobado o la referencia es inválida
/// - `401 Unauthorized`: Sesión inválida
/// - `404 Not Found`: El pago o la publicidad no existen
#[post("/pagos/verificar-pago")]
async fn verify_payment(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    pagos: web::Data<ClientePagos>,
    data: web::Json<VerificarPagoRequest>,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    autorizar(&req, &config.jwt)?;

    let pago = pagos
        .obtener_pago(&data.id_pago)
        .await
        .log_error_context("fetching payment from provider")?;

    if pago.status != "approved" {
        return Ok(HttpResponse::BadRequest().json(json!({
            "success": false,
            "message": "El pago no fue aprobado",
            "payment_status": pago.status
        })));
    }

    // En el camino sincrónico los problemas de referencia son visibles
    // para el cliente, a diferencia del webhook
    match confirmar_pago_aprobado(repo.get_ref(), &pago).await? {
        ResultadoConfirmacion::Marcada(id) | ResultadoConfirmacion::YaPagada(id) => {
            Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "message": "Pago verificado correctamente",
                "id_publicidad": id.to_hex(),
                "pago_realizado": true
            })))
        }
        ResultadoConfirmacion::ReferenciaInvalida => Err(AppError::Validation(
            "La referencia externa del pago es inválida".to_string(),
        )),
        ResultadoConfirmacion::PublicidadInexistente(id) => {
            Err(AppError::not_found_id("Publicidad", &id.to_hex()))
        }
        ResultadoConfirmacion::NoAprobado => Err(AppError::Validation(
            "El pago no fue aprobado".to_string(),
        )),
    }
}

/// Webhook de notificaciones del proveedor
///
/// # Firma
/// Si hay secreto configurado y el request trae el header `x-signature`,
/// se verifica HMAC-SHA256 sobre el manifiesto
/// `id:{data.id};request-id:{x-request-id};ts:{ts};` y una firma inválida
/// responde 401. Sin secreto o sin header la verificación se omite (modo
/// débil para desarrollo).
///
/// # Acuse
/// Fuera de la firma, el webhook responde siempre 200: el proveedor
/// reintenta ante cualquier otro código y la mutación ya es idempotente,
/// así que los errores internos solo se loggean.
#[post("/pagos/webhook")]
async fn payment_webhook(
    repo: web::Data<MongoRepo>,
    config: web::Data<Configuracion>,
    pagos: web::Data<ClientePagos>,
    body: web::Bytes,
    req: HttpRequest,
) -> AppResult<impl Responder> {
    // El cuerpo se parsea de forma laxa: un JSON ilegible no debe hacer
    // que el proveedor reintente
    let notificacion: NotificacionWebhook =
        serde_json::from_slice(&body).unwrap_or_default();

    let data_id = notificacion
        .data
        .as_ref()
        .and_then(|d| d.id.as_ref())
        .map(valor_a_texto)
        .unwrap_or_default();

    let header_firma = req
        .headers()
        .get("x-signature")
        .and_then(|v| v.to_str().ok());
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match evaluar_firma(
        config.pagos.webhook_secret.as_deref(),
        header_firma,
        &data_id,
        request_id,
    ) {
        VeredictoFirma::Invalida => {
            tracing::warn!(request_id = %request_id, "Firma de webhook inválida, rechazado");
            return Err(AppError::Unauthorized("Firma de webhook inválida".to_string()));
        }
        VeredictoFirma::Omitida => {
            tracing::debug!("Webhook sin verificación de firma (secreto o header ausente)");
        }
        VeredictoFirma::Valida => {}
    }

    if let Err(e) = procesar_notificacion(repo.get_ref(), pagos.get_ref(), &data_id).await {
        // Nunca propagar: el acuse debe salir igual
        tracing::error!(error = %e, id_pago = %data_id, "Error procesando webhook de pago");
    }

    Ok(HttpResponse::Ok().finish())
}

/// Consulta el pago notificado y concilia la publicidad si corresponde
async fn procesar_notificacion(
    repo: &MongoRepo,
    pagos: &ClientePagos,
    id_pago: &str,
) -> AppResult<()> {
    if id_pago.is_empty() {
        return Ok(());
    }

    let pago = pagos.obtener_pago(id_pago).await?;

    match confirmar_pago_aprobado(repo, &pago).await? {
        ResultadoConfirmacion::Marcada(id) => {
            tracing::info!(
                id_publicidad = %id.to_hex(),
                "Webhook: publicidad marcada como pagada"
            );
        }
        ResultadoConfirmacion::YaPagada(_) => {
            tracing::debug!(id_pago = %id_pago, "Webhook: pago ya conciliado");
        }
        // En el camino del webhook los problemas de referencia se ignoran
        // en silencio: no hay cliente a quien responderle
        ResultadoConfirmacion::ReferenciaInvalida
        | ResultadoConfirmacion::PublicidadInexistente(_)
        | ResultadoConfirmacion::NoAprobado => {}
    }

    Ok(())
}

/// Configura las rutas relacionadas con pagos
///
/// # Rutas disponibles
/// - `POST /pagos/crear-preferencia` - Crear preferencia de checkout
/// - `POST /pagos/verificar-pago` - Verificación sincrónica
/// - `POST /pagos/webhook` - Notificaciones del proveedor (anónimo)
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_preference);
    cfg.service(verify_payment);
    cfg.service(payment_webhook);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_de_notificacion_como_string_o_numero() {
        assert_eq!(valor_a_texto(&json!("12345")), "12345");
        assert_eq!(valor_a_texto(&json!(12345)), "12345");
        assert_eq!(valor_a_texto(&json!({"x": 1})), "");
        assert_eq!(valor_a_texto(&json!(null)), "");
    }

    #[test]
    fn cuerpo_ilegible_no_rompe_el_parseo() {
        let notificacion: NotificacionWebhook =
            serde_json::from_slice(b"esto no es json").unwrap_or_default();
        assert!(notificacion.data.is_none());
    }

    #[test]
    fn back_urls_para_web() {
        let urls = construir_back_urls(true, "https://salidas.app", "abc123");
        assert_eq!(urls.success, "https://salidas.app/payment/callback?status=success");
        assert_eq!(urls.failure, "https://salidas.app/payment/callback?status=failure");
        assert_eq!(urls.pending, "https://salidas.app/payment/callback?status=pending");
    }

    #[test]
    fn back_urls_para_app() {
        let urls = construir_back_urls(false, "https://salidas.app", "abc123");
        assert_eq!(urls.success, "salidas://payment/success?publicidad_id=abc123");
        assert_eq!(urls.pending, "salidas://payment/pending?publicidad_id=abc123");
    }
}
