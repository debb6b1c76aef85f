use serde::{Deserialize, Serialize};

use crate::capabilities::{HttpError, ValidatedUrl};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_CITY_NAME: &str = "Poznań";

/// Everything the core needs from its environment. Held in the model and
/// replaced by the shell through `Event::BaseUrlConfigured`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_base_url: ValidatedUrl,
    /// Name fragment used to pick the city outline out of the boundary data.
    pub city_name: String,
}

impl AppConfig {
    pub fn new(api_base_url: &str) -> Result<Self, HttpError> {
        Ok(Self {
            api_base_url: ValidatedUrl::new(api_base_url)?,
            city_name: DEFAULT_CITY_NAME.to_string(),
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: ValidatedUrl::local_backend(),
            city_name: DEFAULT_CITY_NAME.to_string(),
        }
    }
}
