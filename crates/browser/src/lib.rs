pub mod shared;
pub mod worker;

pub use shared::TimeoutConfig;
pub use worker::chromium::ChromiumPage;
pub use worker::BrowserSettings;
