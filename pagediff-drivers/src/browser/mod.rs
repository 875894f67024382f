pub mod chrome;
pub mod dom;
pub mod scripts;
mod session;

pub use chrome::{ChromeLauncher, LaunchSettings};
pub use session::{with_session, BrowserLauncher, BrowserSession, Session};
