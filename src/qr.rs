//! QR rendering for pairing artifacts

use base64::{engine::general_purpose::STANDARD, Engine as _};
use qrcode::render::{svg, unicode};
use qrcode::QrCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QrError {
    #[error("Failed to encode QR code: {0}")]
    Encode(#[from] qrcode::types::QrError),
}

/// Encode a pairing payload as an SVG image wrapped in a `data:` URL
pub fn encode_as_image(payload: &str) -> Result<String, QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    let image = code
        .render::<svg::Color<'_>>()
        .min_dimensions(256, 256)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#FFFFFF"))
        .build();

    Ok(format!(
        "data:image/svg+xml;base64,{}",
        STANDARD.encode(image.as_bytes())
    ))
}

/// Render a pairing payload with unicode half blocks for a terminal
pub fn render_terminal(payload: &str) -> Result<String, QrError> {
    let code = QrCode::new(payload.as_bytes())?;
    Ok(code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_svg_data_url() {
        let url = encode_as_image("2@abc,def").unwrap();
        let encoded = url
            .strip_prefix("data:image/svg+xml;base64,")
            .expect("data url prefix");
        let svg = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn encoding_is_deterministic() {
        assert_eq!(
            encode_as_image("same payload").unwrap(),
            encode_as_image("same payload").unwrap()
        );
    }

    #[test]
    fn rejects_payloads_too_large_for_a_qr_code() {
        let huge = "x".repeat(8000);
        assert!(encode_as_image(&huge).is_err());
    }

    #[test]
    fn terminal_rendering_is_multiline() {
        let rendered = render_terminal("2@abc,def").unwrap();
        assert!(rendered.lines().count() > 5);
    }
}
