pub mod chromium;

use serde::{Deserialize, Serialize};

/// Launch options for the audited browser
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub no_sandbox: bool,
    pub chrome_executable: Option<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1920,
            viewport_height: 1080,
            no_sandbox: false,
            // Support custom Chrome path via CHROME_BIN environment variable
            chrome_executable: std::env::var("CHROME_BIN").ok(),
        }
    }
}
