//! # Promo Screen Library
//!
//! Core of a lobby signage display: a rotating sponsor carousel, a scrolling
//! sponsor ticker, a clock and the day's zmanim, served as a single page that
//! is kept live over Server-Sent Events.
//!
//! ## Overview
//!
//! - `carousel`: Sliding-window rotation over the slide list
//! - `sponsors`: Sponsor resolution with cache, sample file, remote and default fallbacks
//! - `cache`: On-disk store for resolved sponsors and the resolver's debug log
//! - `zmanim`: Daily halachic times, generated ahead of time and read per day
//! - `server`: Routes, background tasks and graceful shutdown
//!
//! ## Getting Started
//!
//! ```no_run
//! use promo_screen::{config::CONFIG_FILE, server};
//! use std::path::PathBuf;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), promo_screen::error::PromoScreenError> {
//!     let cancel_token = CancellationToken::new();
//!     let config_path = Some(PathBuf::from(CONFIG_FILE));
//!
//!     server::run(3000, config_path, cancel_token).await
//! }
//! ```
//!
//! Sponsor resolution can also be used on its own:
//!
//! ```no_run
//! use promo_screen::{config::Config, sponsors::SponsorResolver};
//!
//! # async fn example() -> Result<(), promo_screen::error::PromoScreenError> {
//! let config = Config::load(None)?;
//! let resolver = SponsorResolver::from_config(&config, reqwest::Client::new());
//! let resolution = resolver.resolve().await;
//! println!("{} sponsors via {:?}", resolution.items.len(), resolution.report.status);
//! # Ok(())
//! # }
//! ```

/// Custom error types module
///
/// Defines `PromoScreenError`, the single error type propagated across the crate.
pub mod error;

/// Configuration management module
///
/// Loads settings from a JSON5 file with defaults for every field, applies the
/// sponsor endpoint environment override and validates the result.
pub mod config;

/// Slide items, built-in slides and the sponsor ticker line
pub mod slides;

/// Carousel rotation engine
pub mod carousel;

/// Sponsor data cache store
pub mod cache;

/// Sponsor data resolver
///
/// Produces the sponsor list from the first source that yields data: a valid
/// cache, the bundled sample file, the remote endpoint, a stale cache, and
/// finally the built-in placeholders. Every resolution returns a report of
/// which source won.
pub mod sponsors;

/// Zmanim records, generation and display entries
pub mod zmanim;

/// Time formatting and zman proximity helpers
pub mod utils;

/// Shared application state
pub mod state;

/// Display events and the SSE stream
pub mod events;

/// Background rotation, clock and sponsor polling loops
pub mod tasks;

/// Configuration file hot reload
pub mod watcher;

/// Display page and zmanim endpoint
pub mod display;

/// JSON API for the carousel and sponsors
pub mod api;

/// Server operations module
///
/// Wires routes, static files and background tasks together and shuts them all
/// down when the cancellation token fires.
pub mod server;
