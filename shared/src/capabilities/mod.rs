pub mod http;

pub use self::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpResult, ValidatedUrl};

// Render is Crux's built-in capability, re-exported as is.
pub use crux_core::render::Render;
pub use crux_http::Http;

use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "crate::App")]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
}
