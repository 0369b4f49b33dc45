//! # Cliente del proveedor de pagos
//!
//! Cliente HTTP (estilo Mercado Pago) para crear preferencias de checkout
//! y consultar el estado de pagos individuales.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::api::{AppError, AppResult, ResultExt};
use crate::config::ConfigPagos;

/// URLs de retorno tras el checkout
#[derive(Debug, Clone, Serialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

#[derive(Debug, Serialize)]
struct ItemPreferencia {
    title: String,
    quantity: u32,
    currency_id: String,
    unit_price: f64,
}

#[derive(Debug, Serialize)]
struct CuerpoPreferencia {
    items: Vec<ItemPreferencia>,
    back_urls: BackUrls,
    auto_return: String,
    external_reference: String,
    statement_descriptor: String,
    notification_url: String,
}

/// Preferencia creada en el proveedor
#[derive(Debug, Clone, Deserialize)]
pub struct PreferenciaCreada {
    pub id: String,
    /// URL de checkout a la que se redirige al usuario
    pub init_point: String,
}

/// Pago consultado en el proveedor
#[derive(Debug, Clone, Deserialize)]
pub struct PagoProveedor {
    pub id: i64,
    /// "approved", "pending", "rejected", ...
    pub status: String,
    /// Referencia opaca que el proveedor devuelve tal como se la mandamos:
    /// el id de la publicidad en hex
    pub external_reference: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClientePagos {
    http: Client,
    base_url: String,
    access_token: String,
}

impl ClientePagos {
    pub fn new(config: &ConfigPagos) -> AppResult<ClientePagos> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err_internal("Error creando cliente HTTP")?;

        Ok(ClientePagos {
            http,
            base_url: config.base_url.clone(),
            access_token: config.access_token.clone(),
        })
    }

    /// Crea una preferencia de checkout en el proveedor
    pub async fn crear_preferencia(
        &self,
        titulo: &str,
        precio: f64,
        referencia_externa: &str,
        back_urls: BackUrls,
        notification_url: &str,
    ) -> AppResult<PreferenciaCreada> {
        let cuerpo = CuerpoPreferencia {
            items: vec![ItemPreferencia {
                title: titulo.to_string(),
                quantity: 1,
                currency_id: "ARS".to_string(),
                unit_price: precio,
            }],
            back_urls,
            auto_return: "approved".to_string(),
            external_reference: referencia_externa.to_string(),
            statement_descriptor: "Salidas".to_string(),
            notification_url: notification_url.to_string(),
        };

        let respuesta = self
            .http
            .post(format!("{}/checkout/preferences", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&cuerpo)
            .send()
            .await
            .map_err(|e| {
                AppError::internal_trace(&format!("Error creando preferencia: {}", e), None)
            })?;

        if !respuesta.status().is_success() {
            let estado = respuesta.status();
            let detalle = respuesta.text().await.unwrap_or_default();
            tracing::error!(status = %estado, detalle = %detalle, "El proveedor rechazó la preferencia");
            return Err(AppError::Validation(
                "El proveedor de pagos rechazó la preferencia".to_string(),
            ));
        }

        respuesta.json().await.map_err(|e| {
            AppError::internal_trace(&format!("Respuesta de preferencia ilegible: {}", e), None)
        })
    }

    /// Consulta un pago por id
    pub async fn obtener_pago(&self, id_pago: &str) -> AppResult<PagoProveedor> {
        let respuesta = self
            .http
            .get(format!("{}/v1/payments/{}", self.base_url, id_pago))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| {
                AppError::internal_trace(&format!("Error consultando pago: {}", e), None)
            })?;

        if respuesta.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::not_found_id("Pago", id_pago));
        }

        if !respuesta.status().is_success() {
            return Err(AppError::internal_trace(
                &format!("El proveedor respondió {}", respuesta.status()),
                None,
            ));
        }

        respuesta.json().await.map_err(|e| {
            AppError::internal_trace(&format!("Respuesta de pago ilegible: {}", e), None)
        })
    }
}
