//! # Firma de webhooks
//!
//! El proveedor firma cada notificación con HMAC-SHA256 sobre un manifiesto
//! canónico construido con el id del pago, el request-id y el timestamp.
//! El header `x-signature` llega con el formato `ts=<unix>,v1=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Partes del header `x-signature`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmaWebhook {
    pub ts: String,
    pub v1: String,
}

/// Parsea el header `x-signature` (`ts=...,v1=...`, en cualquier orden)
pub fn parsear_firma(header: &str) -> Option<FirmaWebhook> {
    let mut ts = None;
    let mut v1 = None;

    for parte in header.split(',') {
        let parte = parte.trim();
        if let Some(valor) = parte.strip_prefix("ts=") {
            ts = Some(valor.to_string());
        } else if let Some(valor) = parte.strip_prefix("v1=") {
            v1 = Some(valor.to_string());
        }
    }

    Some(FirmaWebhook { ts: ts?, v1: v1? })
}

/// Manifiesto canónico que firma el proveedor
pub fn manifiesto(data_id: &str, request_id: &str, ts: &str) -> String {
    format!("id:{};request-id:{};ts:{};", data_id, request_id, ts)
}

/// Veredicto de la verificación de firma de un webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VeredictoFirma {
    /// Secreto configurado, header presente, firma correcta
    Valida,
    /// Falta el secreto o el header: la verificación se omite
    /// (modo débil, pensado para desarrollo)
    Omitida,
    /// Header malformado o firma que no coincide
    Invalida,
}

/// Evalúa la firma de una notificación entrante.
///
/// La verificación solo corre cuando hay secreto configurado y header
/// presente a la vez; la ausencia de cualquiera de los dos la omite.
pub fn evaluar_firma(
    secreto: Option<&str>,
    header: Option<&str>,
    data_id: &str,
    request_id: &str,
) -> VeredictoFirma {
    let (secreto, header) = match (secreto, header) {
        (Some(s), Some(h)) => (s, h),
        _ => return VeredictoFirma::Omitida,
    };

    let firma = match parsear_firma(header) {
        Some(f) => f,
        None => return VeredictoFirma::Invalida,
    };

    let m = manifiesto(data_id, request_id, &firma.ts);
    if verificar_firma(secreto, &m, &firma.v1) {
        VeredictoFirma::Valida
    } else {
        VeredictoFirma::Invalida
    }
}

/// Verifica la firma hex contra el manifiesto usando el secreto compartido.
/// La comparación es de tiempo constante.
pub fn verificar_firma(secreto: &str, manifiesto: &str, v1_hex: &str) -> bool {
    let esperada = match hex::decode(v1_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let mut mac = match HmacSha256::new_from_slice(secreto.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(manifiesto.as_bytes());
    mac.verify_slice(&esperada).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firmar(secreto: &str, manifiesto: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secreto.as_bytes()).unwrap();
        mac.update(manifiesto.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn parsea_header_en_orden_normal() {
        let firma = parsear_firma("ts=1704908010,v1=abcdef0123").unwrap();
        assert_eq!(firma.ts, "1704908010");
        assert_eq!(firma.v1, "abcdef0123");
    }

    #[test]
    fn parsea_header_con_espacios_y_orden_invertido() {
        let firma = parsear_firma("v1=abc, ts=99").unwrap();
        assert_eq!(firma.ts, "99");
        assert_eq!(firma.v1, "abc");
    }

    #[test]
    fn header_incompleto_no_parsea() {
        assert!(parsear_firma("ts=123").is_none());
        assert!(parsear_firma("v1=abc").is_none());
        assert!(parsear_firma("").is_none());
        assert!(parsear_firma("basura total").is_none());
    }

    #[test]
    fn manifiesto_canonico() {
        assert_eq!(
            manifiesto("12345", "req-1", "1704908010"),
            "id:12345;request-id:req-1;ts:1704908010;"
        );
    }

    #[test]
    fn firma_valida_se_acepta() {
        let m = manifiesto("12345", "req-1", "1704908010");
        let v1 = firmar("mi-secreto", &m);
        assert!(verificar_firma("mi-secreto", &m, &v1));
    }

    #[test]
    fn un_bit_alterado_se_rechaza() {
        let m = manifiesto("12345", "req-1", "1704908010");
        let v1 = firmar("mi-secreto", &m);

        // invertir un bit del primer byte de la firma
        let mut bytes = hex::decode(&v1).unwrap();
        bytes[0] ^= 0x01;
        let adulterada = hex::encode(bytes);

        assert!(!verificar_firma("mi-secreto", &m, &adulterada));
    }

    #[test]
    fn secreto_distinto_se_rechaza() {
        let m = manifiesto("12345", "req-1", "1704908010");
        let v1 = firmar("mi-secreto", &m);
        assert!(!verificar_firma("otro-secreto", &m, &v1));
    }

    #[test]
    fn hex_invalido_se_rechaza() {
        let m = manifiesto("1", "r", "t");
        assert!(!verificar_firma("s", &m, "no-es-hex"));
    }

    #[test]
    fn sin_secreto_configurado_se_omite_la_verificacion() {
        // modo débil: cualquier firma (o ninguna) pasa
        let veredicto = evaluar_firma(None, Some("ts=1,v1=loquesea"), "12345", "req-1");
        assert_eq!(veredicto, VeredictoFirma::Omitida);
    }

    #[test]
    fn sin_header_de_firma_se_omite_la_verificacion() {
        let veredicto = evaluar_firma(Some("secreto"), None, "12345", "req-1");
        assert_eq!(veredicto, VeredictoFirma::Omitida);
    }

    #[test]
    fn con_secreto_y_header_la_firma_se_exige() {
        let ts = "1704908010";
        let m = manifiesto("12345", "req-1", ts);
        let v1 = firmar("mi-secreto", &m);
        let header = format!("ts={},v1={}", ts, v1);

        let veredicto = evaluar_firma(Some("mi-secreto"), Some(&header), "12345", "req-1");
        assert_eq!(veredicto, VeredictoFirma::Valida);

        let veredicto = evaluar_firma(Some("otro-secreto"), Some(&header), "12345", "req-1");
        assert_eq!(veredicto, VeredictoFirma::Invalida);
    }

    #[test]
    fn header_malformado_con_secreto_es_invalido() {
        let veredicto = evaluar_firma(Some("secreto"), Some("basura"), "12345", "req-1");
        assert_eq!(veredicto, VeredictoFirma::Invalida);
    }
}
