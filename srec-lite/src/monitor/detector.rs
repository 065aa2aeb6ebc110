//! Individual source detection.
//!
//! One liveness check is one status page fetch followed by a search for an
//! HLS playlist locator in the body.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::fetcher::{FetchError, PageFetcher};
use crate::{Error, Result};

/// Pattern locating the HLS playlist of a live source.
pub const LOCATOR_PATTERN: &str = r"http.*?/playlist\.m3u8";

/// Placeholder replaced by the source identifier in probe URL templates.
pub const SOURCE_PLACEHOLDER: &str = "{source}";

/// Live status of a source for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveStatus {
    /// Source is live and can be captured from `locator`.
    Live { locator: String },
    /// No locator found on the status page.
    Offline,
}

impl LiveStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, LiveStatus::Live { .. })
    }

    /// The capture locator, if live.
    pub fn resource_locator(&self) -> Option<&str> {
        match self {
            LiveStatus::Live { locator } => Some(locator),
            LiveStatus::Offline => None,
        }
    }
}

/// Pre-compiled locator matcher.
///
/// Built once at startup and shared read-only by every check.
#[derive(Debug, Clone)]
pub struct LocatorMatcher {
    regex: Regex,
}

impl LocatorMatcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            regex: Regex::new(LOCATOR_PATTERN)?,
        })
    }

    /// First locator in `body`, verbatim.
    pub fn find<'a>(&self, body: &'a str) -> Option<&'a str> {
        self.regex.find(body).map(|m| m.as_str())
    }
}

/// Checks whether a source is live by probing its status page.
pub struct LivenessChecker {
    fetcher: Arc<dyn PageFetcher>,
    matcher: Arc<LocatorMatcher>,
    url_template: String,
}

impl LivenessChecker {
    /// Create a checker.
    ///
    /// `url_template` must contain [`SOURCE_PLACEHOLDER`].
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        matcher: Arc<LocatorMatcher>,
        url_template: impl Into<String>,
    ) -> Result<Self> {
        let url_template = url_template.into();
        if !url_template.contains(SOURCE_PLACEHOLDER) {
            return Err(Error::config(format!(
                "probe URL template '{url_template}' does not contain {SOURCE_PLACEHOLDER}"
            )));
        }

        Ok(Self {
            fetcher,
            matcher,
            url_template,
        })
    }

    /// Status page URL for `source`.
    pub fn status_url(&self, source: &str) -> String {
        self.url_template.replace(SOURCE_PLACEHOLDER, source)
    }

    /// Probe `source` once.
    pub async fn check(&self, source: &str) -> std::result::Result<LiveStatus, FetchError> {
        let url = self.status_url(source);
        let body = self.fetcher.fetch(&url).await?;

        match self.matcher.find(&body) {
            Some(locator) => {
                debug!(source = %source, locator = %locator, "Found playlist locator");
                Ok(LiveStatus::Live {
                    locator: locator.to_string(),
                })
            }
            None => Ok(LiveStatus::Offline),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use proptest::prelude::*;

    struct FixedFetcher {
        response: std::result::Result<String, FetchError>,
        requested: Mutex<Vec<String>>,
    }

    impl FixedFetcher {
        fn body(body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: Ok(body.to_string()),
                requested: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                response: Err(FetchError::request("https://example.com/bob/", "timed out")),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for FixedFetcher {
        async fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
            self.requested.lock().push(url.to_string());
            self.response.clone()
        }
    }

    fn checker(fetcher: Arc<FixedFetcher>) -> LivenessChecker {
        LivenessChecker::new(
            fetcher,
            Arc::new(LocatorMatcher::new().unwrap()),
            "https://example.com/{source}/",
        )
        .unwrap()
    }

    #[test]
    fn test_matcher_extracts_exact_span() {
        let matcher = LocatorMatcher::new().unwrap();
        let body = r#"<html><a href="http://cdn.example.com/alice/playlist.m3u8">watch</a>"#;
        assert_eq!(
            matcher.find(body),
            Some("http://cdn.example.com/alice/playlist.m3u8")
        );
    }

    #[test]
    fn test_matcher_stops_at_first_playlist() {
        let matcher = LocatorMatcher::new().unwrap();
        let body = "src='https://edge1.example.net/live/a/playlist.m3u8' alt='https://edge2.example.net/live/a/playlist.m3u8'";
        assert_eq!(
            matcher.find(body),
            Some("https://edge1.example.net/live/a/playlist.m3u8")
        );
    }

    #[test]
    fn test_matcher_no_match() {
        let matcher = LocatorMatcher::new().unwrap();
        assert_eq!(matcher.find("Room is currently offline"), None);
        assert_eq!(matcher.find("http://cdn.example.com/alice/chunk.ts"), None);
        assert_eq!(matcher.find("cdn.example.com/playlist.m3u8"), None);
    }

    #[test]
    fn test_matcher_does_not_span_lines() {
        let matcher = LocatorMatcher::new().unwrap();
        let body = "see http://example.com\nthen /playlist.m3u8";
        assert_eq!(matcher.find(body), None);
    }

    #[test]
    fn test_matcher_inside_multiline_page() {
        let matcher = LocatorMatcher::new().unwrap();
        let body = "<!doctype html>\n<body>\n  var hls = \"https://cdn.example.com/x_y/playlist.m3u8\";\n</body>\n";
        assert_eq!(
            matcher.find(body),
            Some("https://cdn.example.com/x_y/playlist.m3u8")
        );
    }

    #[test]
    fn test_template_requires_placeholder() {
        let result = LivenessChecker::new(
            FixedFetcher::body(""),
            Arc::new(LocatorMatcher::new().unwrap()),
            "https://example.com/",
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_check_live() {
        let fetcher = FixedFetcher::body(
            r#"...<a href="http://cdn.example.com/alice/playlist.m3u8">..."#,
        );
        let checker = checker(fetcher.clone());

        let status = checker.check("alice").await.unwrap();
        assert!(status.is_live());
        assert_eq!(
            status.resource_locator(),
            Some("http://cdn.example.com/alice/playlist.m3u8")
        );
        assert_eq!(
            fetcher.requested.lock().as_slice(),
            ["https://example.com/alice/".to_string()]
        );
    }

    #[tokio::test]
    async fn test_check_offline() {
        let checker = checker(FixedFetcher::body("<p>offline</p>"));
        let status = checker.check("alice").await.unwrap();
        assert_eq!(status, LiveStatus::Offline);
        assert_eq!(status.resource_locator(), None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// A single locator embedded in arbitrary single-line text is
        /// extracted verbatim.
        #[test]
        fn prop_matcher_extracts_embedded_locator(
            before in "[ -gi-~]{0,40}",
            secure in any::<bool>(),
            middle in "[a-zA-Z0-9./:_-]{0,30}",
            after in "[ -~\n]{0,40}",
        ) {
            let scheme = if secure { "https" } else { "http" };
            let locator = format!("{scheme}{middle}/playlist.m3u8");
            prop_assume!(locator.find("/playlist.m3u8") == Some(locator.len() - "/playlist.m3u8".len()));

            let matcher = LocatorMatcher::new().unwrap();
            let body = format!("{before}{locator}{after}");
            prop_assert_eq!(matcher.find(&body), Some(locator.as_str()));
        }
    }

    #[tokio::test]
    async fn test_check_fetch_error_propagates() {
        let checker = checker(FixedFetcher::failing());
        let err = checker.check("bob").await.unwrap_err();
        assert!(matches!(err, FetchError::Request { .. }));
    }
}
