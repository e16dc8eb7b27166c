//! End-to-end tests over the HTTP surface: a real listener on an ephemeral
//! port, real multipart uploads, real files on disk.
//!
//! PDF export tests need a local Chrome/Chromium and are `#[ignore]`d:
//! `cargo test --test http -- --ignored`

use image_curator::config::CuratorConfig;
use image_curator::server::{AppState, router};
use image_curator::store::ImageStore;
use image::{ImageEncoder, Rgba, RgbaImage};
use std::sync::Arc;
use tempfile::TempDir;

struct TestApp {
    base: String,
    // Dropping this removes the uploads directory and database.
    _tmp: TempDir,
    uploads: std::path::PathBuf,
}

async fn spawn_app() -> TestApp {
    let tmp = TempDir::new().unwrap();
    let uploads = tmp.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();

    let config = CuratorConfig {
        upload_dir: uploads.clone(),
        db_path: tmp.path().join("curator.db"),
        export_timeout_secs: 120,
        ..CuratorConfig::default()
    };
    let store = ImageStore::open(&config.db_path).unwrap();
    let state = AppState {
        store: Arc::new(store),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        _tmp: tmp,
        uploads,
    }
}

/// PNG bytes with a uniform RGBA color.
fn png_bytes(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, color);
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    out
}

fn upload_form(bytes: Vec<u8>, filename: &str) -> reqwest::multipart::Form {
    reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
    )
}

#[tokio::test]
async fn upload_then_fetch_roundtrip() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    // A 2000x1000 PNG with alpha: width-bound resize plus flattening.
    let form = upload_form(png_bytes(2000, 1000, Rgba([200, 40, 40, 128])), "scene.png")
        .text("description", "red haze")
        .text("tags", "sky, gold");
    let resp = client
        .post(format!("{}/upload", app.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["width"], 800);
    assert_eq!(body["height"], 400);
    assert_eq!(body["description"], "red haze");
    assert_eq!(body["tags"], serde_json::json!(["sky", "gold"]));
    let filename = body["filename"].as_str().unwrap();
    assert!(filename.ends_with(".png"));

    // Fetching returns the stored artifact byte-for-byte, and it is JPEG
    // content regardless of the carried extension.
    let fetched = client
        .get(format!("{}/images/{}", app.base, filename))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), 200);
    let served = fetched.bytes().await.unwrap();
    let on_disk = std::fs::read(app.uploads.join(filename)).unwrap();
    assert_eq!(served.as_ref(), on_disk.as_slice());

    let stored =
        image::load_from_memory_with_format(&on_disk, image::ImageFormat::Jpeg).unwrap();
    assert!(!stored.color().has_alpha());
    assert_eq!((stored.width(), stored.height()), (800, 400));
}

#[tokio::test]
async fn upload_rejects_disallowed_extension_without_side_effects() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/upload", app.base))
        .multipart(upload_form(b"plain text".to_vec(), "notes.txt"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    // No artifact, no record.
    assert_eq!(std::fs::read_dir(&app.uploads).unwrap().count(), 0);
    let index = client.get(&app.base).send().await.unwrap().text().await.unwrap();
    assert!(!index.contains("grid-item"));
}

#[tokio::test]
async fn upload_rejects_undecodable_image_as_server_fault() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/upload", app.base))
        .multipart(upload_form(b"not a png at all".to_vec(), "fake.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    // Decode detail is logged, not exposed.
    assert_eq!(body["error"], "internal server error");
    assert_eq!(std::fs::read_dir(&app.uploads).unwrap().count(), 0);
}

#[tokio::test]
async fn upload_without_file_part_is_rejected() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let form = reqwest::multipart::Form::new().text("description", "no file here");
    let resp = client
        .post(format!("{}/upload", app.base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "no file part");
}

#[tokio::test]
async fn index_lists_newest_first() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let mut filenames = Vec::new();
    for color in [Rgba([255, 0, 0, 255]), Rgba([0, 255, 0, 255])] {
        let resp = client
            .post(format!("{}/upload", app.base))
            .multipart(upload_form(png_bytes(100, 100, color), "img.png"))
            .send()
            .await
            .unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        filenames.push(body["filename"].as_str().unwrap().to_string());
    }

    let index = client.get(&app.base).send().await.unwrap().text().await.unwrap();
    let first_pos = index.find(&filenames[0]).unwrap();
    let second_pos = index.find(&filenames[1]).unwrap();
    assert!(second_pos < first_pos, "newest upload should render first");
}

#[tokio::test]
async fn layout_views_render_and_empty_collection_is_fine() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    for view in ["zine", "newsletter", "portfolio"] {
        let resp = client
            .get(format!("{}/{}", app.base, view))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200, "{} failed", view);
        assert!(resp.text().await.unwrap().contains("empty-state"));
    }
}

#[tokio::test]
async fn export_of_unknown_view_is_a_validation_error() {
    let app = spawn_app().await;
    let resp = reqwest::get(format!("{}/export/poster", app.base)).await.unwrap();
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("poster"));
}

#[tokio::test]
async fn missing_artifact_is_404_and_traversal_is_400() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/images/nope.png", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .get(format!("{}/images/..%2Fcurator.db", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

// Requires a local Chrome/Chromium install.
#[tokio::test]
#[ignore]
async fn export_zine_with_zero_records_yields_a_pdf() {
    let app = spawn_app().await;
    let resp = reqwest::get(format!("{}/export/zine", app.base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/pdf"
    );
    assert!(
        resp.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .contains("image-curator-zine.pdf")
    );
    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

// Requires a local Chrome/Chromium install.
#[tokio::test]
#[ignore]
async fn export_includes_uploaded_images() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/upload", app.base))
        .multipart(upload_form(png_bytes(400, 300, Rgba([0, 0, 255, 255])), "blue.png"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = reqwest::get(format!("{}/export/portfolio", app.base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let bytes = resp.bytes().await.unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    // A raster page with an embedded image is comfortably larger than an
    // empty one.
    assert!(bytes.len() > 5_000);
}
