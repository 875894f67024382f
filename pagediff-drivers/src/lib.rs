//! Driver layer for browser automation.
//!
//! - [`browser::BrowserLauncher`] / [`browser::BrowserSession`]: the seam the
//!   dynamic extractor renders through
//! - [`browser::ChromeLauncher`]: WebDriver (chromedriver) backed implementation
//! - [`browser::with_session`]: scoped acquisition, the session is always quit
//! - [`browser::dom`]: DOM snapshot and the recursive text walk
pub mod browser;
