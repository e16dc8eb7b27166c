//! PDF export of a rendered layout.
//!
//! The renderer has no HTTP context, so image references must resolve to real
//! files before rasterization: [`resolve_image_refs`] rewrites every
//! `/images/<name>` source to a `file://` URL under the artifact root. The
//! rewritten document plus print overrides is written to a temp file and
//! printed through headless Chrome's `Page.printToPDF`, returning the PDF as
//! an in-memory buffer. No partial PDF is ever returned: any failure along
//! the way surfaces as a single [`ExportError`] carrying the cause.

use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};
use regex::Regex;
use std::io::Write;
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF rasterization failed: {0}")]
    Rasterize(#[from] anyhow::Error),
}

/// Print-specific overrides applied after the supplied stylesheets: page
/// geometry, image clamping, and page-break avoidance so a single image and
/// its caption are never split across a page boundary.
const PRINT_CSS: &str = r#"
@page {
    size: letter;
    margin: 2cm;
}
body {
    background: #fff;
    padding: 0;
}
img {
    max-width: 100%;
    height: auto;
}
.grid-item,
.zine-item,
.newsletter-item,
.portfolio-item {
    break-inside: avoid;
    page-break-inside: avoid;
    margin-bottom: 20px;
}
.image-grid {
    column-count: 2;
}
.site-header nav,
.upload-form,
.search-box,
.tag-list {
    display: none;
}
"#;

/// Matches the src attribute of an artifact reference: `src="/images/<name>"`.
static ARTIFACT_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src="/images/([^"]+)""#).expect("valid regex"));

/// Rewrite artifact-serving references to absolute local file URLs.
///
/// Pure string-to-string, independent of the rest of the export pipeline, so
/// it is testable without a browser or a running HTTP layer.
pub fn resolve_image_refs(html: &str, artifact_root: &Path) -> String {
    ARTIFACT_SRC
        .replace_all(html, |caps: &regex::Captures<'_>| {
            format!(
                r#"src="file://{}""#,
                artifact_root.join(&caps[1]).display()
            )
        })
        .into_owned()
}

/// Append stylesheet sources (and the print overrides) to the document head,
/// falling back to prepending when no `</head>` exists.
fn inject_styles(html: &str, stylesheets: &[&str]) -> String {
    let mut block = String::new();
    for css in stylesheets {
        block.push_str("<style>");
        block.push_str(css);
        block.push_str("</style>");
    }
    block.push_str("<style>");
    block.push_str(PRINT_CSS);
    block.push_str("</style>");

    match html.find("</head>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + block.len());
            out.push_str(&html[..pos]);
            out.push_str(&block);
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{}{}", block, html),
    }
}

fn pdf_options() -> PrintToPdfOptions {
    PrintToPdfOptions {
        print_background: Some(true),
        paper_width: Some(8.5),
        paper_height: Some(11.0),
        margin_top: Some(0.79),
        margin_bottom: Some(0.79),
        margin_left: Some(0.79),
        margin_right: Some(0.79),
        prefer_css_page_size: Some(true),
        ..Default::default()
    }
}

/// Convert rendered layout HTML into PDF bytes.
///
/// `stylesheets` are applied in order before the fixed print overrides.
/// A fresh browser is launched per call; at this system's export volume that
/// costs a second or two and keeps no Chrome process idling between requests.
pub fn export_pdf(
    html: &str,
    stylesheets: &[&str],
    artifact_root: &Path,
) -> Result<Vec<u8>, ExportError> {
    let resolved = resolve_image_refs(html, artifact_root);
    let document = inject_styles(&resolved, stylesheets);

    // Chrome reads the document over file://, same as the image references.
    let mut page = tempfile::Builder::new()
        .prefix("curator-export-")
        .suffix(".html")
        .tempfile()?;
    page.write_all(document.as_bytes())?;
    page.flush()?;

    let browser = Browser::new(LaunchOptions {
        window_size: Some((1280, 800)),
        ..Default::default()
    })?;
    let tab = browser.new_tab()?;
    tab.navigate_to(&format!("file://{}", page.path().display()))?
        .wait_until_navigated()?;

    let bytes = tab.print_to_pdf(Some(pdf_options()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn resolves_artifact_refs_to_file_urls() {
        let html = r#"<img src="/images/abc.png"><img src="/images/def.jpg">"#;
        let out = resolve_image_refs(html, &PathBuf::from("/data/uploads"));
        assert!(out.contains(r#"src="file:///data/uploads/abc.png""#));
        assert!(out.contains(r#"src="file:///data/uploads/def.jpg""#));
        assert!(!out.contains(r#"src="/images/"#));
    }

    #[test]
    fn leaves_non_artifact_refs_alone() {
        let html = r#"<img src="/static/logo.png"><a href="/images/x.png">x</a>"#;
        let out = resolve_image_refs(html, &PathBuf::from("/uploads"));
        assert_eq!(out, html);
    }

    #[test]
    fn resolve_is_idempotent_on_empty_document() {
        assert_eq!(resolve_image_refs("", &PathBuf::from("/uploads")), "");
    }

    #[test]
    fn styles_land_before_closing_head() {
        let html = "<html><head><title>t</title></head><body></body></html>";
        let out = inject_styles(html, &["body { color: red; }"]);
        let head_end = out.find("</head>").unwrap();
        let custom = out.find("color: red").unwrap();
        let print = out.find("break-inside: avoid").unwrap();
        assert!(custom < print, "supplied styles come before print overrides");
        assert!(print < head_end);
    }

    #[test]
    fn styles_prepend_when_no_head() {
        let out = inject_styles("<p>hi</p>", &[]);
        assert!(out.starts_with("<style>"));
        assert!(out.ends_with("<p>hi</p>"));
        assert!(out.contains("@page"));
    }

    #[test]
    fn print_overrides_cover_every_item_class() {
        for class in [".grid-item", ".zine-item", ".newsletter-item", ".portfolio-item"] {
            assert!(PRINT_CSS.contains(class), "{} missing from print CSS", class);
        }
    }

    // Requires a local Chrome/Chromium install.
    // Run with: `cargo test --lib export -- --ignored`
    #[test]
    #[ignore]
    fn exports_a_real_pdf_from_minimal_html() {
        let tmp = tempfile::TempDir::new().unwrap();
        let html = "<html><head></head><body><h1>Empty zine</h1></body></html>";
        let bytes = export_pdf(html, &[crate::layout::BASE_CSS], tmp.path()).unwrap();
        assert!(bytes.starts_with(b"%PDF"), "not a PDF header");
        assert!(bytes.len() > 1000);
    }
}
