//! Detección del tipo de contenido de una imagen por sus magic bytes.

/// Devuelve el content-type según la cabecera del archivo.
/// Si no se reconoce ninguna firma se asume JPEG.
pub fn tipo_contenido(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
        "image/png"
    } else if bytes.starts_with(&[0x47, 0x49, 0x46]) {
        "image/gif"
    } else if bytes.starts_with(&[0x52, 0x49, 0x46, 0x46]) {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconoce_png() {
        assert_eq!(tipo_contenido(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A]), "image/png");
    }

    #[test]
    fn reconoce_gif() {
        assert_eq!(tipo_contenido(b"GIF89a..."), "image/gif");
    }

    #[test]
    fn reconoce_webp() {
        assert_eq!(tipo_contenido(b"RIFF....WEBP"), "image/webp");
    }

    #[test]
    fn por_defecto_jpeg() {
        assert_eq!(tipo_contenido(&[0xFF, 0xD8, 0xFF]), "image/jpeg");
        assert_eq!(tipo_contenido(&[]), "image/jpeg");
    }
}
