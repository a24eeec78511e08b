//! HTTP page fetcher with HTML-to-text extraction.
//!
//! Pages are downloaded with a browser-like user agent and parsed with
//! `scraper`. Text is taken from the most specific content root available
//! (`<article>`, then `<main>`, then `<body>`), keeping block-level elements
//! and skipping navigation, scripts, forms, and similar chrome. Title,
//! author, and publication date are scraped from meta tags as hints for the
//! extraction prompt.

use super::PageFetcher;
use crate::config::AppConfig;
use crate::error::FetchError;
use crate::models::RawPage;
use crate::utils::collapse_whitespace;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::CONTENT_TYPE;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Elements whose text is never part of the article.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "footer", "aside", "form", "iframe", "svg", "button",
    "template", "select",
];

/// Elements collected as one line of article text each.
const BLOCK_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "blockquote", "pre", "figcaption",
];

static BLOCK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(&BLOCK_TAGS.join(", ")).unwrap());
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static ROOT_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article", "main", "[role=main]", "body"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static TITLE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [r#"meta[property="og:title"]"#, r#"meta[name="twitter:title"]"#, "title"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static AUTHOR_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"meta[name="author"]"#,
        r#"meta[property="article:author"]"#,
        r#"meta[name="byl"]"#,
        r#"[rel="author"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});
static DATE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"meta[property="article:published_time"]"#,
        r#"meta[name="date"]"#,
        r#"meta[itemprop="datePublished"]"#,
        "time[datetime]",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

/// Fetches article pages over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &Url) -> Result<RawPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Article fetch returned error status");
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !is_textual(content_type) {
                return Err(FetchError::NotText {
                    url: url.to_string(),
                    content_type: content_type.to_string(),
                });
            }
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| request_error(url, e))?;
        debug!(bytes = body.len(), %final_url, "Downloaded article page");

        let page = parse_page(&final_url, &body);
        if page.text.trim().is_empty() {
            return Err(FetchError::EmptyPage {
                url: url.to_string(),
            });
        }
        info!(chars = page.text.chars().count(), "Parsed article page");
        Ok(page)
    }
}

fn request_error(url: &Url, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: e.to_string(),
        }
    }
}

fn is_textual(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.starts_with("text/") || ct.contains("html") || ct.contains("xml")
}

/// Parse an HTML document into a [`RawPage`].
pub fn parse_page(url: &str, html: &str) -> RawPage {
    let document = Html::parse_document(html);

    // Most specific root kind first; among roots of one kind the one with the most text.
    let lines = ROOT_SELECTORS
        .iter()
        .find_map(|sel| {
            document
                .select(sel)
                .filter(|root| !inside(root, SKIP_TAGS))
                .map(block_lines)
                .filter(|lines| !lines.is_empty())
                .max_by_key(|lines| lines.iter().map(String::len).sum::<usize>())
        })
        .unwrap_or_else(|| {
            let body = document
                .select(&BODY_SELECTOR)
                .next()
                .unwrap_or_else(|| document.root_element());
            loose_text(body)
        });

    RawPage {
        url: url.to_string(),
        title_hint: first_value(&document, &TITLE_SELECTORS),
        author_hint: first_value(&document, &AUTHOR_SELECTORS),
        date_hint: first_value(&document, &DATE_SELECTORS),
        text: lines.join("\n\n"),
    }
}

/// One line per outermost block element under `root`, skipping chrome.
fn block_lines(root: ElementRef) -> Vec<String> {
    root.select(&BLOCK_SELECTOR)
        .filter(|el| !inside(el, SKIP_TAGS) && !inside(el, BLOCK_TAGS))
        .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
        .filter(|line| !line.is_empty())
        .collect()
}

/// True if any ancestor of `el` is one of `tags`.
fn inside(el: &ElementRef, tags: &[&str]) -> bool {
    el.ancestors()
        .filter_map(|node| node.value().as_element())
        .any(|e| tags.contains(&e.name()))
}

/// Every text node under `root` that is not inside a skipped element.
fn loose_text(root: ElementRef) -> Vec<String> {
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let skipped = node
                .ancestors()
                .filter_map(|a| a.value().as_element())
                .any(|e| SKIP_TAGS.contains(&e.name()));
            (!skipped).then(|| collapse_whitespace(text))
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// First non-empty `content` attribute, `datetime` attribute, or text among `selectors`.
fn first_value(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|sel| {
        document.select(sel).find_map(|el| {
            let value = el
                .value()
                .attr("content")
                .or_else(|| el.value().attr("datetime"))
                .map(str::to_string)
                .unwrap_or_else(|| el.text().collect::<Vec<_>>().join(" "));
            let value = collapse_whitespace(&value);
            (!value.is_empty()).then_some(value)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        http::{StatusCode, header},
        response::Html,
        routing::get,
    };
    use tokio::net::TcpListener;

    const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title>Fallback Title | Daily Planet</title>
  <meta property="og:title" content="City Council Approves Budget">
  <meta name="author" content="Lois Lane">
  <meta property="article:published_time" content="2025-05-06T10:00:00Z">
  <style>p { color: red; }</style>
</head>
<body>
  <nav><ul><li>Home</li><li>World</li></ul></nav>
  <article>
    <h1>City Council Approves Budget</h1>
    <p>The council voted 7-2 on Tuesday.</p>
    <aside><p>Subscribe to our newsletter!</p></aside>
    <p>The budget   totals
       $4.2 million.</p>
    <ul><li>Item <p>nested</p></li></ul>
    <script>trackPageView();</script>
  </article>
  <footer><p>Copyright Daily Planet</p></footer>
</body>
</html>"#;

    #[test]
    fn test_parse_page_extracts_article_blocks() {
        let page = parse_page("https://example.com/a", PAGE);
        assert_eq!(page.url, "https://example.com/a");
        assert_eq!(
            page.text,
            "City Council Approves Budget\n\nThe council voted 7-2 on Tuesday.\n\nThe budget totals $4.2 million.\n\nItem nested"
        );
        assert!(!page.text.contains("Subscribe"));
        assert!(!page.text.contains("Copyright"));
        assert!(!page.text.contains("Home"));
        assert!(!page.text.contains("trackPageView"));
    }

    #[test]
    fn test_parse_page_metadata_hints() {
        let page = parse_page("https://example.com/a", PAGE);
        assert_eq!(page.title_hint.as_deref(), Some("City Council Approves Budget"));
        assert_eq!(page.author_hint.as_deref(), Some("Lois Lane"));
        assert_eq!(page.date_hint.as_deref(), Some("2025-05-06T10:00:00Z"));
    }

    #[test]
    fn test_parse_page_falls_back_to_loose_text() {
        let html = "<html><head><title>Plain</title></head><body><div>Just some   text</div><script>x()</script></body></html>";
        let page = parse_page("https://example.com", html);
        assert_eq!(page.text, "Just some text");
        assert_eq!(page.title_hint.as_deref(), Some("Plain"));
        assert_eq!(page.author_hint, None);
        assert_eq!(page.date_hint, None);
    }

    #[test]
    fn test_parse_page_time_element_date() {
        let html = r#"<html><body><main><time datetime="2024-01-02">Jan 2</time><p>Body</p></main></body></html>"#;
        let page = parse_page("https://example.com", html);
        assert_eq!(page.date_hint.as_deref(), Some("2024-01-02"));
        assert_eq!(page.text, "Body");
    }

    #[test]
    fn test_parse_page_skips_article_inside_nav() {
        let html = r#"<html><body>
            <nav><article><p>Related teaser</p></article></nav>
            <main><article><p>The council voted 7-2 on Tuesday.</p><p>The budget passed.</p></article></main>
            <footer><article><p>Footer promo</p></article></footer>
        </body></html>"#;
        let page = parse_page("https://example.com", html);
        assert_eq!(
            page.text,
            "The council voted 7-2 on Tuesday.\n\nThe budget passed."
        );
    }

    #[test]
    fn test_parse_page_prefers_longest_article() {
        let html = r#"<html><body><main>
            <article><p>Short card</p></article>
            <article><p>The full story runs for a good deal longer than the card.</p><p>Second paragraph.</p></article>
        </main></body></html>"#;
        let page = parse_page("https://example.com", html);
        assert!(page.text.starts_with("The full story"));
        assert!(!page.text.contains("Short card"));
    }

    #[test]
    fn test_parse_page_empty_article_falls_through_to_body() {
        let html = r#"<html><body><article></article><div><p>Body paragraph.</p></div></body></html>"#;
        let page = parse_page("https://example.com", html);
        assert_eq!(page.text, "Body paragraph.");
    }

    async fn spawn_site(router: Router) -> Url {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn site() -> Router {
        Router::new()
            .route("/article", get(|| async { Html(PAGE) }))
            .route("/missing", get(|| async { (StatusCode::NOT_FOUND, "gone") }))
            .route(
                "/report.pdf",
                get(|| async { ([(header::CONTENT_TYPE, "application/pdf")], "%PDF-1.4") }),
            )
            .route("/blank", get(|| async { Html("<html><body><script>x()</script></body></html>") }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Html(PAGE)
                }),
            )
    }

    fn fetcher(fetch_timeout_secs: u64) -> HttpFetcher {
        HttpFetcher::new(&AppConfig {
            fetch_timeout_secs,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_article_page() {
        let base = spawn_site(site()).await;
        let page = fetcher(10).fetch(&base.join("article").unwrap()).await.unwrap();
        assert!(page.url.ends_with("/article"));
        assert!(page.text.starts_with("City Council Approves Budget"));
        assert_eq!(page.author_hint.as_deref(), Some("Lois Lane"));
    }

    #[tokio::test]
    async fn test_fetch_error_status() {
        let base = spawn_site(site()).await;
        let err = fetcher(10)
            .fetch(&base.join("missing").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_text() {
        let base = spawn_site(site()).await;
        let err = fetcher(10)
            .fetch(&base.join("report.pdf").unwrap())
            .await
            .unwrap_err();
        match err {
            FetchError::NotText { content_type, .. } => assert_eq!(content_type, "application/pdf"),
            other => panic!("expected NotText, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_empty_page() {
        let base = spawn_site(site()).await;
        let err = fetcher(10)
            .fetch(&base.join("blank").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::EmptyPage { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let base = spawn_site(site()).await;
        let err = fetcher(1)
            .fetch(&base.join("slow").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let url = Url::parse(&format!("http://{addr}/article")).unwrap();
        let err = fetcher(5).fetch(&url).await.unwrap_err();
        assert!(matches!(err, FetchError::Network { .. }), "{err:?}");
    }

    #[test]
    fn test_is_textual() {
        assert!(is_textual("text/html; charset=utf-8"));
        assert!(is_textual("application/xhtml+xml"));
        assert!(!is_textual("application/pdf"));
        assert!(!is_textual("image/png"));
    }
}
