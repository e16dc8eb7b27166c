//! HTML presentation layouts.
//!
//! Renders the record list into one of four arrangements using
//! [maud](https://maud.lambda.xyz/): the default grid (index page, with
//! upload form, search box, and tag list) plus the three exportable views —
//! zine, newsletter, portfolio. Templates are compile-time checked and all
//! interpolation is auto-escaped.
//!
//! The stylesheet is embedded at compile time; the PDF exporter reuses it so
//! screen and print render from the same source. The index page additionally
//! embeds the search filter script, which drives the search box against the
//! `data-tags`/`data-description` attributes on each grid item.

use crate::store::ImageRecord;
use maud::{DOCTYPE, Markup, html};
use std::fmt;
use std::str::FromStr;

/// Base stylesheet shared by every layout and by the PDF export.
pub const BASE_CSS: &str = include_str!("../static/style.css");

/// Client-side search filter for the index grid.
const GALLERY_JS: &str = include_str!("../static/gallery.js");

/// The three exportable presentation layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Zine,
    Newsletter,
    Portfolio,
}

/// Raised when a request names a layout that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownView(pub String);

impl fmt::Display for UnknownView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown view type: {:?}", self.0)
    }
}

impl std::error::Error for UnknownView {}

impl ViewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewKind::Zine => "zine",
            ViewKind::Newsletter => "newsletter",
            ViewKind::Portfolio => "portfolio",
        }
    }

    fn title(self) -> &'static str {
        match self {
            ViewKind::Zine => "Zine",
            ViewKind::Newsletter => "Newsletter",
            ViewKind::Portfolio => "Portfolio",
        }
    }
}

impl FromStr for ViewKind {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zine" => Ok(ViewKind::Zine),
            "newsletter" => Ok(ViewKind::Newsletter),
            "portfolio" => Ok(ViewKind::Portfolio),
            other => Err(UnknownView(other.to_string())),
        }
    }
}

fn artifact_url(record: &ImageRecord) -> String {
    format!("/images/{}", record.stored_filename)
}

fn caption_text(record: &ImageRecord) -> &str {
    record.description.as_deref().unwrap_or("")
}

/// Base HTML document with the embedded stylesheet.
fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (maud::PreEscaped(BASE_CSS)) }
            }
            body {
                (content)
            }
        }
    }
}

fn layout_nav() -> Markup {
    html! {
        nav {
            a href="/" { "Grid" }
            a href="/zine" { "Zine" }
            a href="/newsletter" { "Newsletter" }
            a href="/portfolio" { "Portfolio" }
        }
    }
}

fn empty_state() -> Markup {
    html! {
        p.empty-state { "No images yet. Upload something." }
    }
}

/// Index page: upload form, live search, tag list, and the default grid.
pub fn render_index(records: &[ImageRecord], tags: &[String]) -> Markup {
    base_document(
        "Image Curator",
        html! {
            header.site-header {
                h1 { "Image Curator" }
                (layout_nav())
            }
            form.upload-form method="post" action="/upload" enctype="multipart/form-data" {
                input type="file" name="file" accept=".png,.jpg,.jpeg,.gif" required;
                input type="text" name="description" placeholder="Description";
                input type="text" name="tags" placeholder="Tags (comma-separated)";
                button type="submit" { "Upload" }
            }
            input.search-box id="search" type="search" placeholder="Filter by tag or description";
            @if !tags.is_empty() {
                ul.tag-list {
                    @for tag in tags {
                        li { (tag) }
                    }
                }
            }
            @if records.is_empty() {
                (empty_state())
            } @else {
                div.image-grid {
                    @for record in records {
                        figure.grid-item
                            data-tags=(record.tags.join(","))
                            data-description=(caption_text(record))
                        {
                            img src=(artifact_url(record))
                                alt=(record.original_filename)
                                width=(record.width)
                                height=(record.height);
                            @if !caption_text(record).is_empty() {
                                figcaption { (caption_text(record)) }
                            }
                        }
                    }
                }
            }
            script { (maud::PreEscaped(GALLERY_JS)) }
        },
    )
}

fn render_zine(records: &[ImageRecord]) -> Markup {
    html! {
        @for record in records {
            section.zine-item {
                img src=(artifact_url(record)) alt=(record.original_filename);
                @if !caption_text(record).is_empty() {
                    p.zine-caption { (caption_text(record)) }
                }
            }
        }
    }
}

fn render_newsletter(records: &[ImageRecord]) -> Markup {
    html! {
        div.newsletter-body {
            @for record in records {
                article.newsletter-item {
                    img src=(artifact_url(record)) alt=(record.original_filename);
                    div {
                        @if !caption_text(record).is_empty() {
                            p { (caption_text(record)) }
                        }
                        @if !record.tags.is_empty() {
                            p { small { (record.tags.join(", ")) } }
                        }
                    }
                }
            }
        }
    }
}

fn render_portfolio(records: &[ImageRecord]) -> Markup {
    html! {
        div.portfolio-grid {
            @for record in records {
                figure.portfolio-item {
                    img src=(artifact_url(record)) alt=(record.original_filename);
                    @if !caption_text(record).is_empty() {
                        figcaption { (caption_text(record)) }
                    }
                }
            }
        }
    }
}

/// Render a named layout over the full record list, newest first.
pub fn render_view(kind: ViewKind, records: &[ImageRecord]) -> Markup {
    let body = if records.is_empty() {
        empty_state()
    } else {
        match kind {
            ViewKind::Zine => render_zine(records),
            ViewKind::Newsletter => render_newsletter(records),
            ViewKind::Portfolio => render_portfolio(records),
        }
    };
    base_document(
        kind.title(),
        html! {
            header.site-header {
                h1 { (kind.title()) }
                (layout_nav())
            }
            (body)
        },
    )
}
