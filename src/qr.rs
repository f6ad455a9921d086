//! QR code fields – encode a string into an SVG subtree.
//!
//! The `qrcode` crate provides the module matrix; the graphic itself is a
//! single `<path>` inside an `<svg viewBox>` so the placeholder it replaces
//! decides the final size.

use std::fmt;
use std::str::FromStr;

use qrcode::{Color, EcLevel, QrCode};

use crate::dom::Element;
use crate::error::MergeError;

/// Light modules kept around the symbol on every side.
pub const QUIET_ZONE: usize = 4;

/// QR error correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrLevel {
    /// ~7% recovery (default).
    #[default]
    L,
    M,
    Q,
    H,
}

impl QrLevel {
    fn ec_level(self) -> EcLevel {
        match self {
            QrLevel::L => EcLevel::L,
            QrLevel::M => EcLevel::M,
            QrLevel::Q => EcLevel::Q,
            QrLevel::H => EcLevel::H,
        }
    }
}

impl FromStr for QrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(QrLevel::L),
            "M" => Ok(QrLevel::M),
            "Q" => Ok(QrLevel::Q),
            "H" => Ok(QrLevel::H),
            other => Err(format!(
                "unknown QR error correction level '{other}' (expected L, M, Q or H)"
            )),
        }
    }
}

impl fmt::Display for QrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QrLevel::L => "L",
            QrLevel::M => "M",
            QrLevel::Q => "Q",
            QrLevel::H => "H",
        };
        f.write_str(s)
    }
}

/// Encode `data` as a QR symbol and return it as an `<svg>` element.
pub fn encode_qr(data: &str, level: QrLevel) -> Result<Element, MergeError> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), level.ec_level()).map_err(
        |e| MergeError::QrEncode {
            value: data.to_string(),
            reason: e.to_string(),
        },
    )?;

    let width = code.width();
    let size = width + 2 * QUIET_ZONE;
    let path = module_path(&code.to_colors(), width);

    log::debug!("encoded {data:?} as a {width}x{width} QR symbol");

    let mut svg = Element::svg("svg").with_attr("viewBox", &format!("0 0 {size} {size}"));
    svg.push_element(
        Element::svg("path")
            .with_attr("fill", "#000")
            .with_attr("shape-rendering", "crispEdges")
            .with_attr("d", &path),
    );
    Ok(svg)
}

/// Path data covering every dark module, one rectangle per horizontal run.
fn module_path(colors: &[Color], width: usize) -> String {
    let mut d = String::new();
    for (y, row) in colors.chunks(width).enumerate() {
        let mut x = 0;
        while x < width {
            if row[x] != Color::Dark {
                x += 1;
                continue;
            }
            let start = x;
            while x < width && row[x] == Color::Dark {
                x += 1;
            }
            let run = x - start;
            d.push_str(&format!(
                "M{},{}h{run}v1h-{run}z",
                start + QUIET_ZONE,
                y + QUIET_ZONE
            ));
        }
    }
    d
}
