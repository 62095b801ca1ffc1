//! Archive capture client
//!
//! A thin, authenticated HTTP client for the upstream web archive. It knows
//! how to fetch archived pages and stream archived assets, and it classifies
//! upstream responses into the error taxonomy the fetch layer acts on.
//! Retry policy lives one layer up.

mod client;

pub use client::{AssetStream, CaptureClient, CaptureError, PageCapture};
