//! Source monitoring.
//!
//! Responsible for:
//! - Fetching a source's status page
//! - Deciding from the page body whether the source is live
//! - Extracting the playlist locator a capture needs

mod detector;
mod fetcher;

pub use detector::{
    LOCATOR_PATTERN, LiveStatus, LivenessChecker, LocatorMatcher, SOURCE_PLACEHOLDER,
};
pub use fetcher::{FetchError, HttpPageFetcher, PageFetcher};
