//! HTTP endpoint tests using axum-test
//!
//! Each test gets its own scratch directory and a router with the office
//! suite disabled, so conversions always take the library path.

use std::io::{Cursor, Read};
use std::path::Path;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use clap::Parser;
use doc_convert::model::{Block, Paragraph};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

use crate::config::{Args, Config};
use crate::{build_router, AppState};

struct Harness {
    server: TestServer,
    uploads: TempDir,
}

fn harness_with(extra: &[&str]) -> Harness {
    let uploads = tempfile::tempdir().unwrap();
    let upload_dir = uploads.path().to_str().unwrap().to_string();

    let mut argv = vec!["utility-server", "--upload-dir", upload_dir.as_str(), "--no-office"];
    argv.extend_from_slice(extra);
    let config = Config::from_args(&Args::try_parse_from(argv).unwrap()).unwrap();

    Harness {
        server: TestServer::new(build_router(AppState::new(config))).unwrap(),
        uploads,
    }
}

fn harness() -> Harness {
    harness_with(&[])
}

fn sample_png() -> Vec<u8> {
    let image = RgbImage::from_fn(64, 48, |x, y| Rgb([(x * 4) as u8, (y * 5) as u8, 128]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// Letter-size document whose pages read "Page 1", "Page 2", ...
fn sample_pdf(pages: u32) -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for n in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(format!("Page {}", n))]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

fn sample_docx() -> Vec<u8> {
    doc_convert::library::docx_writer::write_docx(&[Block::Paragraph(Paragraph::new(
        "Hello from Word",
    ))])
    .unwrap()
}

fn file_part(data: Vec<u8>, name: &str, mime: &str) -> Part {
    Part::bytes(data).file_name(name).mime_type(mime)
}

fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

fn header(response: &TestResponse, name: &str) -> String {
    response.header(name).to_str().unwrap().to_string()
}

fn assert_error(response: &TestResponse, status: StatusCode, code: &str) {
    response.assert_status(status);
    let json = response.json::<Value>();
    assert_eq!(json["success"], false);
    assert_eq!(json["code"], code);
}

fn assert_scratch_empty(uploads: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(uploads).unwrap().collect();
    assert!(leftovers.is_empty(), "scratch left behind: {:?}", leftovers);
}

#[tokio::test]
async fn test_health_returns_200() {
    let h = harness();
    let response = h.server.get("/health").await;
    response.assert_status_ok();

    let json = response.json::<Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "utility-server");
}

#[tokio::test]
async fn test_tools_catalog() {
    let h = harness();
    let response = h.server.get("/api/tools").await;
    response.assert_status_ok();

    let json = response.json::<Value>();
    assert!(json["success"].as_bool().unwrap());
    assert_eq!(json["count"], 12);
    assert_eq!(json["conversion_strategy"], "library");
    assert_eq!(json["default_quality"], 30);

    let merge = json["tools"]
        .as_array()
        .unwrap()
        .iter()
        .find(|tool| tool["path"] == "/pdf/merge")
        .unwrap();
    assert_eq!(merge["accepts"], serde_json::json!(["pdf"]));
}

// Images

#[tokio::test]
async fn test_compress_image_never_grows() {
    let h = harness();
    let png = sample_png();
    let original = png.len();

    let response = h
        .server
        .post("/compress")
        .multipart(
            MultipartForm::new()
                .add_part("image", file_part(png, "photo.png", "image/png"))
                .add_text("quality", "40"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(header(&response, "content-type"), "image/png");
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"compressed_photo.png\""
    );
    assert_eq!(header(&response, "x-original-size"), original.to_string());

    let body = response.as_bytes();
    assert!(body.len() <= original);
    assert_eq!(header(&response, "x-processed-size"), body.len().to_string());
    image::load_from_memory(body).unwrap();
}

#[tokio::test]
async fn test_compress_image_into_other_format() {
    let h = harness();
    let response = h
        .server
        .post("/compress")
        .multipart(
            MultipartForm::new()
                .add_part("image", file_part(sample_png(), "photo.png", "image/png"))
                .add_text("format", "jpg")
                .add_text("max_dimension", "32"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(header(&response, "content-type"), "image/jpeg");
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"compressed_photo.jpg\""
    );

    let image = image::load_from_memory(response.as_bytes()).unwrap();
    assert_eq!((image.width(), image.height()), (32, 24));
}

#[tokio::test]
async fn test_compress_rejects_bad_uploads() {
    let h = harness();

    // Missing file
    let response = h
        .server
        .post("/compress")
        .multipart(MultipartForm::new().add_text("quality", "40"))
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");

    // Empty file
    let response = h
        .server
        .post("/compress")
        .multipart(MultipartForm::new().add_part("image", file_part(Vec::new(), "a.png", "image/png")))
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");

    // Extension not allowed
    let response = h
        .server
        .post("/compress")
        .multipart(MultipartForm::new().add_part("image", file_part(sample_png(), "a.txt", "text/plain")))
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");

    // Content does not match the extension
    let response = h
        .server
        .post("/compress")
        .multipart(MultipartForm::new().add_part("image", file_part(sample_pdf(1), "a.png", "image/png")))
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");
}

#[tokio::test]
async fn test_compress_rejects_bad_quality() {
    let h = harness();
    for quality in ["0", "101", "high"] {
        let response = h
            .server
            .post("/compress")
            .multipart(
                MultipartForm::new()
                    .add_part("image", file_part(sample_png(), "photo.png", "image/png"))
                    .add_text("quality", quality),
            )
            .await;
        assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");
    }
}

#[tokio::test]
async fn test_convert_image() {
    let h = harness();
    let response = h
        .server
        .post("/convert")
        .multipart(
            MultipartForm::new()
                .add_part("image", file_part(sample_png(), "photo.png", "image/png"))
                .add_text("format", "webp"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(header(&response, "content-type"), "image/webp");
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"converted_photo.webp\""
    );
    let image =
        image::load_from_memory_with_format(response.as_bytes(), ImageFormat::WebP).unwrap();
    assert_eq!(image.width(), 64);
}

#[tokio::test]
async fn test_convert_image_unknown_format() {
    let h = harness();
    let response = h
        .server
        .post("/convert")
        .multipart(
            MultipartForm::new()
                .add_part("image", file_part(sample_png(), "photo.png", "image/png"))
                .add_text("format", "heic"),
        )
        .await;
    assert_error(&response, StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT");

    let response = h
        .server
        .post("/convert")
        .multipart(MultipartForm::new().add_part("image", file_part(sample_png(), "photo.png", "image/png")))
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");
}

// QR codes

#[tokio::test]
async fn test_qr_png_and_svg() {
    let h = harness();

    let response = h
        .server
        .post("/qr")
        .form(&[("data", "https://example.com"), ("error_correction", "H")])
        .await;
    response.assert_status_ok();
    assert_eq!(header(&response, "content-type"), "image/png");
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"qr_code.png\""
    );
    let image = image::load_from_memory(response.as_bytes()).unwrap();
    assert!(image.width() >= 256);

    let response = h
        .server
        .post("/qr")
        .form(&[("data", "hello"), ("format", "svg"), ("size", "128")])
        .await;
    response.assert_status_ok();
    assert_eq!(header(&response, "content-type"), "image/svg+xml");
    assert!(response.text().contains("<svg"));
}

#[tokio::test]
async fn test_qr_default_format_from_config() {
    let h = harness_with(&["--qr-format", "svg"]);
    let response = h.server.post("/qr").form(&[("data", "hello")]).await;

    response.assert_status_ok();
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"qr_code.svg\""
    );
}

#[tokio::test]
async fn test_qr_rejects_bad_input() {
    let h = harness();
    for form in [
        vec![("data", "  ")],
        vec![("format", "png")],
        vec![("data", "x"), ("error_correction", "Z")],
        vec![("data", "x"), ("format", "gif")],
        vec![("data", "x"), ("size", "huge")],
        vec![("data", "x"), ("size", "100000")],
    ] {
        let response = h.server.post("/qr").form(&form).await;
        assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");
    }
}

// PDF tools

#[tokio::test]
async fn test_pdf_compress() {
    let h = harness();
    let pdf = sample_pdf(3);
    let original = pdf.len();

    let response = h
        .server
        .post("/pdf/compress")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(pdf, "doc.pdf", "application/pdf"))
                .add_text("level", "high"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"compressed_doc.pdf\""
    );
    assert!(response.as_bytes().len() <= original);
    assert_eq!(page_count(response.as_bytes()), 3);
}

#[tokio::test]
async fn test_pdf_compress_rejects_level_and_garbage() {
    let h = harness();
    let response = h
        .server
        .post("/pdf/compress")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(sample_pdf(1), "doc.pdf", "application/pdf"))
                .add_text("level", "extreme"),
        )
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");

    // Passes the signature check but is not a readable PDF
    let response = h
        .server
        .post("/pdf/compress")
        .multipart(MultipartForm::new().add_part(
            "file",
            file_part(b"%PDF-1.7 garbage".to_vec(), "doc.pdf", "application/pdf"),
        ))
        .await;
    assert_error(&response, StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT");
}

#[tokio::test]
async fn test_pdf_merge() {
    let h = harness();
    let response = h
        .server
        .post("/pdf/merge")
        .multipart(
            MultipartForm::new()
                .add_part("files", file_part(sample_pdf(2), "a.pdf", "application/pdf"))
                .add_part("files", file_part(sample_pdf(1), "b.pdf", "application/pdf")),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"merged_output.pdf\""
    );
    assert_eq!(page_count(response.as_bytes()), 3);
}

#[tokio::test]
async fn test_pdf_merge_needs_two_files() {
    let h = harness();
    let response = h
        .server
        .post("/pdf/merge")
        .multipart(
            MultipartForm::new()
                .add_part("files", file_part(sample_pdf(2), "a.pdf", "application/pdf")),
        )
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");
}

#[tokio::test]
async fn test_pdf_split_returns_zip() {
    let h = harness();
    let response = h
        .server
        .post("/pdf/split")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(sample_pdf(5), "doc.pdf", "application/pdf"))
                .add_text("ranges", "1-2; 3-9"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(header(&response, "content-type"), "application/zip");
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"split_doc.zip\""
    );

    let mut archive = zip::ZipArchive::new(Cursor::new(response.as_bytes().to_vec())).unwrap();
    assert_eq!(archive.len(), 2);

    let mut second = Vec::new();
    archive
        .by_name("split_2_doc.pdf")
        .unwrap()
        .read_to_end(&mut second)
        .unwrap();
    // 3-9 is clamped to the three remaining pages
    assert_eq!(page_count(&second), 3);
}

#[tokio::test]
async fn test_pdf_extract() {
    let h = harness();
    let response = h
        .server
        .post("/pdf/extract")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(sample_pdf(4), "doc.pdf", "application/pdf"))
                .add_text("pages", "1, 3-4, 12"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"extracted_doc.pdf\""
    );
    assert_eq!(page_count(response.as_bytes()), 3);

    let response = h
        .server
        .post("/pdf/extract")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(sample_pdf(4), "doc.pdf", "application/pdf"))
                .add_text("pages", "9"),
        )
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");
}

#[tokio::test]
async fn test_pdf_extract_open_ended_span() {
    let h = harness();
    let started = std::time::Instant::now();
    let response = h
        .server
        .post("/pdf/extract")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(sample_pdf(4), "doc.pdf", "application/pdf"))
                .add_text("pages", "3-4294967295"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(page_count(response.as_bytes()), 2);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}

#[tokio::test]
async fn test_pdf_rotate() {
    let h = harness();
    let response = h
        .server
        .post("/pdf/rotate")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(sample_pdf(3), "doc.pdf", "application/pdf"))
                .add_text("rotation", "90")
                .add_text("pages", "2-3"),
        )
        .await;

    response.assert_status_ok();
    let doc = Document::load_mem(response.as_bytes()).unwrap();
    let rotations: Vec<i64> = doc
        .get_pages()
        .values()
        .map(|&id| {
            doc.get_dictionary(id)
                .unwrap()
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0)
        })
        .collect();
    assert_eq!(rotations, vec![0, 90, 90]);

    let response = h
        .server
        .post("/pdf/rotate")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(sample_pdf(1), "doc.pdf", "application/pdf"))
                .add_text("rotation", "45"),
        )
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");
}

#[tokio::test]
async fn test_pdf_sign() {
    let h = harness();
    let response = h
        .server
        .post("/pdf/sign")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(sample_pdf(2), "doc.pdf", "application/pdf"))
                .add_part("signature", file_part(sample_png(), "sig.png", "image/png"))
                .add_text("page", "2")
                .add_text("x", "100")
                .add_text("y", "100")
                .add_text("width", "150")
                .add_text("rotation", "15"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"signed_doc.pdf\""
    );

    let doc = Document::load_mem(response.as_bytes()).unwrap();
    let pages = doc.get_pages();
    let draws_image = |page: u32| {
        let content = doc.get_page_content(pages[&page]).unwrap();
        Content::decode(&content)
            .unwrap()
            .operations
            .iter()
            .any(|op| op.operator == "Do")
    };
    assert!(!draws_image(1));
    assert!(draws_image(2));
}

#[tokio::test]
async fn test_pdf_sign_rejects_incomplete_placement() {
    let h = harness();
    let base = || {
        MultipartForm::new()
            .add_part("file", file_part(sample_pdf(1), "doc.pdf", "application/pdf"))
            .add_part("signature", file_part(sample_png(), "sig.png", "image/png"))
            .add_text("page", "1")
    };

    // Missing y
    let response = h
        .server
        .post("/pdf/sign")
        .multipart(base().add_text("x", "10"))
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");

    // Half a viewport
    let response = h
        .server
        .post("/pdf/sign")
        .multipart(
            base()
                .add_text("x", "10")
                .add_text("y", "10")
                .add_text("viewport_width", "800"),
        )
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");

    // Signature that is not an image
    let response = h
        .server
        .post("/pdf/sign")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(sample_pdf(1), "doc.pdf", "application/pdf"))
                .add_part("signature", file_part(sample_pdf(1), "sig.png", "image/png"))
                .add_text("page", "1")
                .add_text("x", "10")
                .add_text("y", "10"),
        )
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");
}

// Document conversion

#[tokio::test]
async fn test_pdf_to_word_uses_library_and_cleans_up() {
    let h = harness();
    let response = h
        .server
        .post("/pdf/to-word")
        .multipart(
            MultipartForm::new()
                .add_part("file", file_part(sample_pdf(2), "report.pdf", "application/pdf")),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"converted_report.docx\""
    );
    assert!(response.as_bytes().starts_with(b"PK\x03\x04"));
    assert_scratch_empty(h.uploads.path());
}

#[tokio::test]
async fn test_word_to_pdf_uses_library_and_cleans_up() {
    let h = harness();
    let response = h
        .server
        .post("/word/to-pdf")
        .multipart(MultipartForm::new().add_part(
            "file",
            file_part(
                sample_docx(),
                "letter.docx",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ),
        ))
        .await;

    response.assert_status_ok();
    assert_eq!(header(&response, "content-type"), "application/pdf");
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"converted_letter.pdf\""
    );
    assert_eq!(page_count(response.as_bytes()), 1);
    assert_scratch_empty(h.uploads.path());
}

#[tokio::test]
async fn test_conversion_rejects_wrong_document() {
    let h = harness();

    // A zip that is not a Word document passes the signature check only
    let mut fake = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut fake));
        zip.start_file("hello.txt", zip::write::SimpleFileOptions::default())
            .unwrap();
        std::io::Write::write_all(&mut zip, b"hi").unwrap();
        zip.finish().unwrap();
    }

    let response = h
        .server
        .post("/word/to-pdf")
        .multipart(MultipartForm::new().add_part("file", file_part(fake, "fake.docx", "application/zip")))
        .await;
    assert_error(&response, StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT");
    assert_scratch_empty(h.uploads.path());

    let response = h
        .server
        .post("/word/to-pdf")
        .multipart(MultipartForm::new().add_part(
            "file",
            file_part(sample_pdf(1), "doc.pdf", "application/pdf"),
        ))
        .await;
    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");
}

#[tokio::test]
async fn test_upload_limit() {
    let h = harness_with(&["--max-upload-mb", "1"]);
    let response = h
        .server
        .post("/pdf/compress")
        .multipart(MultipartForm::new().add_part(
            "file",
            file_part(vec![b'%'; 2 * 1024 * 1024], "big.pdf", "application/pdf"),
        ))
        .await;

    assert_error(&response, StatusCode::BAD_REQUEST, "INVALID_INPUT");
}
