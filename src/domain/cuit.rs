//! Validación de CUIT (identificador tributario argentino, 11 dígitos con
//! dígito verificador).

use crate::api::AppError;

/// Multiplicadores del algoritmo estándar de verificación
const PESOS: [u32; 10] = [5, 4, 3, 2, 7, 6, 5, 4, 3, 2];

/// Valida un CUIT completo (11 dígitos numéricos, sin guiones).
///
/// El dígito verificador es `11 - (suma ponderada mod 11)`, con los casos
/// especiales 11→0 y 10→9.
pub fn validar_cuit(cuit: &str) -> Result<(), AppError> {
    if cuit.len() != 11 || !cuit.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation_field(
            "cuit",
            "debe tener exactamente 11 dígitos numéricos",
        ));
    }

    let digitos: Vec<u32> = cuit.chars().filter_map(|c| c.to_digit(10)).collect();

    let suma: u32 = digitos[..10]
        .iter()
        .zip(PESOS.iter())
        .map(|(d, p)| d * p)
        .sum();

    let verificador = match 11 - (suma % 11) {
        11 => 0,
        10 => 9,
        v => v,
    };

    if verificador != digitos[10] {
        return Err(AppError::validation_field(
            "cuit",
            "el dígito verificador no es válido",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuit_valido() {
        assert!(validar_cuit("20324842749").is_ok());
        // caso especial: 11 - resto = 11 -> verificador 0
        assert!(validar_cuit("20631706690").is_ok());
        // caso especial: 11 - resto = 10 -> verificador 9
        assert!(validar_cuit("20291417779").is_ok());
    }

    #[test]
    fn verificador_incorrecto_falla() {
        // mismo cuerpo que un CUIT válido con el último dígito alterado
        assert!(validar_cuit("20324842743").is_err());
        assert!(validar_cuit("20345678901").is_err());
    }

    #[test]
    fn largo_incorrecto_falla() {
        assert!(validar_cuit("2032484274").is_err());
        assert!(validar_cuit("203248427491").is_err());
        assert!(validar_cuit("").is_err());
    }

    #[test]
    fn caracteres_no_numericos_fallan() {
        assert!(validar_cuit("20-3248427-9").is_err());
        assert!(validar_cuit("2032484274a").is_err());
    }
}
