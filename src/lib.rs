//! # Image Curator
//!
//! A small web application for collecting images: uploads are validated,
//! resized, flattened, and re-encoded into normalized JPEG artifacts; a
//! SQLite table holds one metadata record per artifact; and the collection
//! renders into several HTML presentation layouts, any of which can be
//! exported as a paginated PDF.
//!
//! # Pipeline
//!
//! ```text
//! upload → normalize (decode, resize, flatten, encode) → artifact on disk
//!        → store (metadata record)
//! view   → store (newest first) → layout (maud HTML)
//! export → layout HTML → resolve /images/ refs to file:// → Chrome printToPDF
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`normalize`] | Upload validation, UUID naming, Lanczos3 resize to the configured bound, alpha flattening, JPEG encoding |
//! | [`store`] | SQLite-backed image records: CRUD, reverse-chronological listing, substring search, tag aggregation |
//! | [`layout`] | Maud templates for the grid, zine, newsletter, and portfolio layouts |
//! | [`export`] | Image-reference resolution, print overrides, PDF rasterization via headless Chrome |
//! | [`server`] | axum routes dispatching to the above |
//! | [`config`] | TOML-backed runtime configuration with stock defaults |
//! | [`error`] | Error taxonomy and its HTTP status mapping |
//!
//! # Design Decisions
//!
//! ## Normalized Artifacts, Not Originals
//!
//! The stored file is the only artifact; original upload bytes are never
//! kept. Every recorded dimension and byte size describes the normalized
//! file. Stored names are freshly generated UUIDs plus the claimed
//! extension, so user input never influences filesystem paths and racing
//! uploads cannot collide.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/): compile-time
//! checked, type-safe, XSS-escaped by default, and no template directory to
//! ship or get out of sync.
//!
//! ## Chrome for PDF, Not a PDF Library
//!
//! The exportable views are real CSS layouts; re-implementing their layout
//! in a PDF drawing library would fork the rendering logic. Printing the
//! same HTML through headless Chrome keeps one source of truth, at the cost
//! of requiring a Chrome/Chromium install for export.

pub mod config;
pub mod error;
pub mod export;
pub mod layout;
pub mod normalize;
pub mod server;
pub mod store;
