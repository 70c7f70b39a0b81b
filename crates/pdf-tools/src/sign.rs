//! Visual signature stamping
//!
//! Draws a signature image onto one page: the image becomes an Image XObject
//! (with an SMask when it has transparency), is registered in the page
//! resources, and is painted by an extra content stream whose `cm` matrix
//! encodes position, size and rotation.

use crate::coords::{dom_to_pdf, page_media_box, CoordinateOrigin};
use crate::error::PdfToolError;
use crate::merge::find_inherited;
use crate::{load_document, save_document};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use std::io::Write;

fn default_scale() -> f64 {
    0.5
}

/// Where and how to draw the signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignaturePlacement {
    /// 1-based page number
    pub page: u32,
    /// Left edge of the (unrotated) signature box
    pub x: f64,
    /// Bottom edge for `BottomLeft`, top edge for `TopLeft`
    pub y: f64,
    /// Points per image pixel, used when `width` is not given
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Explicit box width; height follows the image aspect ratio
    #[serde(default)]
    pub width: Option<f64>,
    /// Clockwise rotation in degrees around the box centre, 0..=360
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub origin: CoordinateOrigin,
    /// On-screen page size in pixels when `x`, `y` and `width` are pixels
    #[serde(default)]
    pub viewport: Option<(f64, f64)>,
}

impl SignaturePlacement {
    pub fn new(page: u32, x: f64, y: f64) -> Self {
        Self {
            page,
            x,
            y,
            scale: default_scale(),
            width: None,
            rotation: 0.0,
            origin: CoordinateOrigin::BottomLeft,
            viewport: None,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_origin(mut self, origin: CoordinateOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_viewport(mut self, width: f64, height: f64) -> Self {
        self.viewport = Some((width, height));
        self.origin = CoordinateOrigin::TopLeft;
        self
    }

    fn validate(&self) -> Result<(), PdfToolError> {
        if self.page == 0 {
            return Err(PdfToolError::InvalidRange("Page numbers start at 1".into()));
        }
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(PdfToolError::InvalidInput("Position must be a finite number".into()));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(PdfToolError::InvalidInput("Scale must be positive".into()));
        }
        if let Some(width) = self.width {
            if !(width.is_finite() && width > 0.0) {
                return Err(PdfToolError::InvalidInput("Width must be positive".into()));
            }
        }
        if !(0.0..=360.0).contains(&self.rotation) {
            return Err(PdfToolError::InvalidInput(format!(
                "Rotation must be between 0 and 360 degrees, got {}",
                self.rotation
            )));
        }
        if let Some((width, height)) = self.viewport {
            if !(width > 0.0 && height > 0.0) {
                return Err(PdfToolError::InvalidInput("Viewport must be positive".into()));
            }
        }
        Ok(())
    }
}

/// Signature box in PDF user space (bottom-left corner plus size)
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlacedBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Stamp `signature` (any decodable image) onto `pdf` according to `placement`
pub fn stamp_signature(
    pdf: &[u8],
    signature: &[u8],
    placement: &SignaturePlacement,
) -> Result<Vec<u8>, PdfToolError> {
    placement.validate()?;

    let image = image::load_from_memory(signature)
        .map_err(|e| PdfToolError::UnsupportedImage(e.to_string()))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(PdfToolError::UnsupportedImage("Image has no pixels".into()));
    }

    let mut doc = load_document(pdf)?;
    let pages = doc.get_pages();
    let page_id = *pages.get(&placement.page).ok_or_else(|| {
        PdfToolError::InvalidRange(format!(
            "Page {} does not exist (document has {} pages)",
            placement.page,
            pages.len()
        ))
    })?;

    let media_box = page_media_box(&doc, page_id);
    let placed = resolve_box(placement, media_box, (image.width(), image.height()));

    let (image_stream, mask_stream) = image_xobject(&image)?;
    let mut image_stream = image_stream;
    if let Some(mask) = mask_stream {
        let mask_id = doc.add_object(Object::Stream(mask));
        image_stream.dict.set("SMask", Object::Reference(mask_id));
    }
    let image_id = doc.add_object(Object::Stream(image_stream));

    let name = register_xobject(&mut doc, page_id, image_id)?;
    append_stamp(&mut doc, page_id, &name, placement_matrix(placed, placement.rotation))?;

    save_document(&mut doc)
}

/// Work out the signature box in PDF space
pub(crate) fn resolve_box(
    placement: &SignaturePlacement,
    media_box: [f64; 4],
    (pixel_width, pixel_height): (u32, u32),
) -> PlacedBox {
    let aspect = pixel_height as f64 / pixel_width as f64;
    let width = placement
        .width
        .unwrap_or(pixel_width as f64 * placement.scale);

    let [mb_x, mb_y, mb_width, mb_height] = media_box;

    match placement.viewport {
        Some((view_width, view_height)) => {
            // One factor for both axes keeps the image undistorted
            let width = width * mb_width / view_width;
            let height = width * aspect;
            let (left, top) = dom_to_pdf(placement.x, placement.y, view_width, view_height, media_box);
            PlacedBox {
                x: left,
                y: top - height,
                width,
                height,
            }
        }
        None => {
            let height = width * aspect;
            let y = match placement.origin {
                CoordinateOrigin::BottomLeft => mb_y + placement.y,
                CoordinateOrigin::TopLeft => mb_y + mb_height - placement.y - height,
            };
            PlacedBox {
                x: mb_x + placement.x,
                y,
                width,
                height,
            }
        }
    }
}

/// `cm` operands mapping the unit square onto `placed`, rotated clockwise about its centre
pub(crate) fn placement_matrix(placed: PlacedBox, rotation_degrees: f64) -> [f64; 6] {
    let theta = -rotation_degrees.to_radians();
    let (sin, cos) = theta.sin_cos();
    let (w, h) = (placed.width, placed.height);
    let cx = placed.x + w / 2.0;
    let cy = placed.y + h / 2.0;

    [
        w * cos,
        w * sin,
        -h * sin,
        h * cos,
        cx - (w / 2.0) * cos + (h / 2.0) * sin,
        cy - (w / 2.0) * sin - (h / 2.0) * cos,
    ]
}

/// Build the RGB image stream and, if any pixel is translucent, its alpha mask
fn image_xobject(image: &DynamicImage) -> Result<(Stream, Option<Stream>), PdfToolError> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let image_stream = Stream::new(
        image_dict(width, height, b"DeviceRGB"),
        deflate(&rgb)?,
    );

    let mask_stream = if alpha.iter().any(|&a| a != u8::MAX) {
        Some(Stream::new(
            image_dict(width, height, b"DeviceGray"),
            deflate(&alpha)?,
        ))
    } else {
        None
    };

    Ok((image_stream, mask_stream))
}

fn image_dict(width: u32, height: u32, color_space: &[u8]) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", Object::Name(color_space.to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
    dict
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, PdfToolError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| PdfToolError::OperationError(format!("Failed to compress image: {}", e)))
}

/// Where a dictionary entry lives
enum Slot {
    Referenced(ObjectId),
    Inline,
    Missing,
}

fn entry_slot(dict: &Dictionary, key: &[u8]) -> Slot {
    match dict.get(key) {
        Ok(Object::Reference(id)) => Slot::Referenced(*id),
        Ok(Object::Dictionary(_)) => Slot::Inline,
        _ => Slot::Missing,
    }
}

fn op_error(e: lopdf::Error) -> PdfToolError {
    PdfToolError::OperationError(e.to_string())
}

fn page_dict_mut(doc: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary, PdfToolError> {
    doc.get_object_mut(page_id)
        .and_then(|object| object.as_dict_mut())
        .map_err(op_error)
}

/// Give the page its own resource dictionary (copying an inherited one) and
/// return a mutable handle to it
fn page_resources_mut(
    doc: &mut Document,
    page_id: ObjectId,
) -> Result<&mut Dictionary, PdfToolError> {
    let slot = {
        let page = doc
            .get_object(page_id)
            .and_then(|object| object.as_dict())
            .map_err(op_error)?;
        entry_slot(page, b"Resources")
    };

    match slot {
        Slot::Referenced(id) => doc
            .get_object_mut(id)
            .and_then(|object| object.as_dict_mut())
            .map_err(op_error),
        Slot::Inline => page_dict_mut(doc, page_id)?
            .get_mut(b"Resources")
            .and_then(|object| object.as_dict_mut())
            .map_err(op_error),
        Slot::Missing => {
            let inherited = match find_inherited(doc, page_id, b"Resources") {
                Some(Object::Reference(id)) => doc
                    .get_object(id)
                    .and_then(|object| object.as_dict())
                    .cloned()
                    .unwrap_or_default(),
                Some(Object::Dictionary(dict)) => dict,
                _ => Dictionary::new(),
            };
            let page = page_dict_mut(doc, page_id)?;
            page.set("Resources", Object::Dictionary(inherited));
            page.get_mut(b"Resources")
                .and_then(|object| object.as_dict_mut())
                .map_err(op_error)
        }
    }
}

fn unique_name(existing: &Dictionary) -> Vec<u8> {
    (0..)
        .map(|n| format!("SigIm{}", n).into_bytes())
        .find(|name| !existing.has(name))
        .unwrap_or_else(|| b"SigIm".to_vec())
}

/// Add `image_id` to the page's `/XObject` resources and return its name
fn register_xobject(
    doc: &mut Document,
    page_id: ObjectId,
    image_id: ObjectId,
) -> Result<Vec<u8>, PdfToolError> {
    let xobject_slot = entry_slot(page_resources_mut(doc, page_id)?, b"XObject");

    let xobjects = match xobject_slot {
        Slot::Referenced(id) => doc
            .get_object_mut(id)
            .and_then(|object| object.as_dict_mut())
            .map_err(op_error)?,
        Slot::Inline => page_resources_mut(doc, page_id)?
            .get_mut(b"XObject")
            .and_then(|object| object.as_dict_mut())
            .map_err(op_error)?,
        Slot::Missing => {
            let resources = page_resources_mut(doc, page_id)?;
            resources.set("XObject", Object::Dictionary(Dictionary::new()));
            resources
                .get_mut(b"XObject")
                .and_then(|object| object.as_dict_mut())
                .map_err(op_error)?
        }
    };

    let name = unique_name(xobjects);
    xobjects.set(name.clone(), Object::Reference(image_id));
    Ok(name)
}

/// Wrap existing content in `q … Q` and append the drawing operations
fn append_stamp(
    doc: &mut Document,
    page_id: ObjectId,
    name: &[u8],
    matrix: [f64; 6],
) -> Result<(), PdfToolError> {
    let existing: Vec<Object> = {
        let page = doc
            .get_object(page_id)
            .and_then(|object| object.as_dict())
            .map_err(op_error)?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => vec![Object::Reference(*id)],
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let mut operations = Vec::new();
    if !existing.is_empty() {
        operations.push(Operation::new("Q", vec![]));
    }
    operations.push(Operation::new("q", vec![]));
    operations.push(Operation::new(
        "cm",
        matrix.iter().map(|&v| Object::Real(v as f32)).collect(),
    ));
    operations.push(Operation::new("Do", vec![Object::Name(name.to_vec())]));
    operations.push(Operation::new("Q", vec![]));

    let encode = |operations: Vec<Operation>| {
        Content { operations }
            .encode()
            .map_err(|e| PdfToolError::OperationError(format!("Failed to encode content: {}", e)))
    };

    let mut contents = Vec::with_capacity(existing.len() + 2);
    if !existing.is_empty() {
        let save = encode(vec![Operation::new("q", vec![])])?;
        contents.push(Object::Reference(
            doc.add_object(Stream::new(Dictionary::new(), save)),
        ));
        contents.extend(existing);
    }
    let stamp = encode(operations)?;
    contents.push(Object::Reference(
        doc.add_object(Stream::new(Dictionary::new(), stamp)),
    ));

    page_dict_mut(doc, page_id)?.set("Contents", Object::Array(contents));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{create_test_pdf, page_texts};
    use image::{ImageFormat, Rgba, RgbaImage};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    fn signature_png(width: u32, height: u32, transparent: bool) -> Vec<u8> {
        let mut img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 128, 255]));
        if transparent {
            img.put_pixel(0, 0, Rgba([255, 255, 255, 0]));
        }
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn page_xobjects(bytes: &[u8], page: u32) -> Vec<ObjectId> {
        let doc = Document::load_mem(bytes).unwrap();
        let page_id = doc.get_pages()[&page];
        let resources = match find_inherited(&doc, page_id, b"Resources").unwrap() {
            Object::Dictionary(dict) => dict,
            Object::Reference(id) => doc.get_object(id).unwrap().as_dict().unwrap().clone(),
            other => panic!("unexpected resources {:?}", other),
        };
        match resources.get(b"XObject") {
            Ok(Object::Dictionary(xobjects)) => xobjects
                .iter()
                .map(|(_, value)| value.as_reference().unwrap())
                .collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_stamp_adds_image_to_page() {
        let pdf = create_test_pdf(2, "Doc");
        let placement = SignaturePlacement::new(2, 100.0, 100.0);

        let signed = stamp_signature(&pdf, &signature_png(40, 20, true), &placement).unwrap();

        assert!(page_xobjects(&signed, 1).is_empty());
        let images = page_xobjects(&signed, 2);
        assert_eq!(images.len(), 1);

        let doc = Document::load_mem(&signed).unwrap();
        let image = doc.get_object(images[0]).unwrap().as_stream().unwrap();
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 40);
        assert_eq!(image.dict.get(b"Height").unwrap().as_i64().unwrap(), 20);
        assert!(image.dict.get(b"SMask").is_ok());
    }

    #[test]
    fn test_opaque_image_has_no_mask() {
        let pdf = create_test_pdf(1, "Doc");
        let signed = stamp_signature(
            &pdf,
            &signature_png(10, 10, false),
            &SignaturePlacement::new(1, 0.0, 0.0),
        )
        .unwrap();

        let doc = Document::load_mem(&signed).unwrap();
        let image = doc
            .get_object(page_xobjects(&signed, 1)[0])
            .unwrap()
            .as_stream()
            .unwrap();
        assert!(image.dict.get(b"SMask").is_err());
    }

    #[test]
    fn test_stamp_keeps_existing_content() {
        let pdf = create_test_pdf(1, "Doc");
        let signed = stamp_signature(
            &pdf,
            &signature_png(10, 10, false),
            &SignaturePlacement::new(1, 10.0, 10.0),
        )
        .unwrap();

        assert_eq!(page_texts(&signed), vec!["Doc-Page-1"]);

        let doc = Document::load_mem(&signed).unwrap();
        let page_id = doc.get_pages()[&1];
        let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
        let operators: Vec<&str> = content
            .operations
            .iter()
            .map(|op| op.operator.as_str())
            .collect();
        assert_eq!(operators.first(), Some(&"q"));
        assert!(operators.contains(&"Do"));
        assert_eq!(operators.last(), Some(&"Q"));
    }

    #[test]
    fn test_stamp_twice_uses_distinct_names() {
        let pdf = create_test_pdf(1, "Doc");
        let sig = signature_png(10, 10, false);
        let once = stamp_signature(&pdf, &sig, &SignaturePlacement::new(1, 0.0, 0.0)).unwrap();
        let twice = stamp_signature(&once, &sig, &SignaturePlacement::new(1, 50.0, 0.0)).unwrap();
        assert_eq!(page_xobjects(&twice, 1).len(), 2);
    }

    #[test]
    fn test_missing_page_fails() {
        let pdf = create_test_pdf(1, "Doc");
        let err = stamp_signature(
            &pdf,
            &signature_png(10, 10, false),
            &SignaturePlacement::new(3, 0.0, 0.0),
        )
        .unwrap_err();
        assert!(matches!(err, PdfToolError::InvalidRange(_)));
    }

    #[test]
    fn test_bad_image_fails() {
        let pdf = create_test_pdf(1, "Doc");
        let err = stamp_signature(&pdf, b"not an image", &SignaturePlacement::new(1, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, PdfToolError::UnsupportedImage(_)));
    }

    #[test]
    fn test_rotation_out_of_range_fails() {
        let pdf = create_test_pdf(1, "Doc");
        let placement = SignaturePlacement::new(1, 0.0, 0.0).with_rotation(400.0);
        let err = stamp_signature(&pdf, &signature_png(4, 4, false), &placement).unwrap_err();
        assert!(matches!(err, PdfToolError::InvalidInput(_)));
    }

    #[test]
    fn test_resolve_box_bottom_left() {
        let placement = SignaturePlacement::new(1, 50.0, 60.0).with_scale(2.0);
        let placed = resolve_box(&placement, [0.0, 0.0, 612.0, 792.0], (100, 50));
        assert_eq!(
            placed,
            PlacedBox {
                x: 50.0,
                y: 60.0,
                width: 200.0,
                height: 100.0
            }
        );
    }

    #[test]
    fn test_resolve_box_top_left() {
        let placement = SignaturePlacement::new(1, 50.0, 60.0)
            .with_width(100.0)
            .with_origin(CoordinateOrigin::TopLeft);
        let placed = resolve_box(&placement, [0.0, 0.0, 612.0, 792.0], (200, 100));
        // Top edge sits 60pt below the top of the page
        assert!((placed.y + placed.height - 732.0).abs() < 1e-9);
        assert!((placed.height - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_resolve_box_viewport_pixels() {
        // Page rendered at half size: 306 x 396 pixels
        let placement = SignaturePlacement::new(1, 153.0, 198.0)
            .with_width(50.0)
            .with_viewport(306.0, 396.0);
        let placed = resolve_box(&placement, [0.0, 0.0, 612.0, 792.0], (100, 100));
        assert!((placed.x - 306.0).abs() < 1e-9);
        assert!((placed.width - 100.0).abs() < 1e-9);
        assert!((placed.y + placed.height - 396.0).abs() < 1e-9);
    }

    #[test]
    fn test_matrix_without_rotation_is_scale_and_translate() {
        let placed = PlacedBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
        };
        let m = placement_matrix(placed, 0.0);
        let expected = [30.0, 0.0, 0.0, 40.0, 10.0, 20.0];
        for (got, want) in m.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-9, "{:?} != {:?}", m, expected);
        }
    }

    #[test]
    fn test_matrix_rotation_keeps_centre() {
        let placed = PlacedBox {
            x: 100.0,
            y: 100.0,
            width: 60.0,
            height: 20.0,
        };
        for degrees in [0.0, 45.0, 90.0, 180.0, 270.0, 360.0] {
            let [a, b, c, d, e, f] = placement_matrix(placed, degrees);
            // Centre of the unit square maps to the centre of the box
            let cx = a * 0.5 + c * 0.5 + e;
            let cy = b * 0.5 + d * 0.5 + f;
            assert!((cx - 130.0).abs() < 1e-9);
            assert!((cy - 110.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_matrix_quarter_turn_is_clockwise() {
        let placed = PlacedBox {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
        };
        let [a, b, ..] = placement_matrix(placed, 90.0);
        // The image's x axis now points down the page
        assert!(a.abs() < 1e-9);
        assert!((b + 10.0).abs() < 1e-9);
    }
}
