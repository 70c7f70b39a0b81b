//! Coordinate transformation between DOM and PDF coordinate systems

use crate::merge::find_inherited;
use lopdf::{Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// US Letter, used when a page carries no usable MediaBox
pub const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Where placement coordinates are measured from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateOrigin {
    /// PDF native: origin at the bottom-left corner, y grows upwards
    #[default]
    BottomLeft,
    /// Screen style: origin at the top-left corner, y grows downwards
    TopLeft,
}

impl FromStr for CoordinateOrigin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "bottom_left" | "pdf" => Ok(CoordinateOrigin::BottomLeft),
            "top_left" | "dom" | "screen" => Ok(CoordinateOrigin::TopLeft),
            other => Err(format!("Unknown coordinate origin: {}", other)),
        }
    }
}

/// Convert DOM coordinates (top-left origin, pixels) to PDF coordinates (bottom-left origin, points)
pub fn dom_to_pdf(
    dom_x: f64,
    dom_y: f64,
    container_width: f64,
    container_height: f64,
    media_box: [f64; 4],
) -> (f64, f64) {
    let [mb_x, mb_y, mb_width, mb_height] = media_box;

    let x_pct = dom_x / container_width;
    let y_pct = dom_y / container_height;

    // Flip Y axis
    let pdf_x = mb_x + (x_pct * mb_width);
    let pdf_y = mb_y + (mb_height - (y_pct * mb_height));

    (pdf_x, pdf_y)
}

/// Page MediaBox as `[x, y, width, height]`, inherited if necessary
pub fn page_media_box(doc: &Document, page_id: ObjectId) -> [f64; 4] {
    let Some(Object::Array(values)) = find_inherited(doc, page_id, b"MediaBox") else {
        return DEFAULT_MEDIA_BOX;
    };
    if values.len() != 4 {
        return DEFAULT_MEDIA_BOX;
    }

    let mut corners = [0.0; 4];
    for (slot, value) in corners.iter_mut().zip(values.iter()) {
        *slot = match value {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return DEFAULT_MEDIA_BOX,
        };
    }

    let [x1, y1, x2, y2] = corners;
    [x1.min(x2), y1.min(y2), (x2 - x1).abs(), (y2 - y1).abs()]
}
