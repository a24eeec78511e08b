//! Article page fetching.
//!
//! The extraction stage consumes the fetch capability through the
//! [`PageFetcher`] trait so tests can substitute canned pages. The default
//! implementation, [`html::HttpFetcher`], downloads the page with `reqwest`
//! and strips it to visible text with `scraper`.
//!
//! | Implementation | Module | Method |
//! |----------------|--------|--------|
//! | [`html::HttpFetcher`] | [`html`] | HTTP GET + HTML text extraction |

use crate::error::FetchError;
use crate::models::RawPage;
use async_trait::async_trait;
use url::Url;

pub mod html;

pub use html::HttpFetcher;

/// Retrieve the raw content of a web page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return its visible text plus metadata hints.
    async fn fetch(&self, url: &Url) -> Result<RawPage, FetchError>;
}
