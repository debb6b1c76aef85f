// lib.rs - street art catalogue core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod admin;
pub mod api;
pub mod auth;
pub mod capabilities;
pub mod config;
pub mod entity;
pub mod event;
pub mod map;
pub mod model;
pub mod registration;
pub mod submission;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::admin::{AdminError, EditField, FieldValue, Selection};
use crate::auth::AuthError;
use crate::capabilities::HttpError;
use crate::entity::{EntityType, RowItem};
use crate::event::ValidationError;
use crate::map::{BoundingBox, Camera, DetailState, MapError};
use crate::registration::{Commute, RegistrationError, MAX_COMMUTES};
use crate::submission::SubmissionError;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use crux_core::{render::Render, App as CruxApp};
pub use event::Event;
pub use model::{Model, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Authentication,
    Authorization,
    Validation,
    NotFound,
    Conflict,
    RateLimited,
    Serialization,
    Deserialization,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Authentication => "AUTH_ERROR",
            Self::Authorization => "FORBIDDEN",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimited => "RATE_LIMITED",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Conflict | Self::RateLimited | Self::Internal => {
                ErrorSeverity::Transient
            }

            Self::Serialization | Self::InvalidState => ErrorSeverity::Fatal,

            Self::Authentication
            | Self::Authorization
            | Self::Validation
            | Self::NotFound
            | Self::Deserialization
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::RateLimited | Self::Conflict | Self::Internal
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub status: Option<u16>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            status: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::Network => {
                "Unable to reach the server. Please check your connection and try again.".into()
            }
            ErrorKind::Authentication => "Please sign in to continue.".into(),
            ErrorKind::Authorization => {
                "You don't have permission to perform this action.".into()
            }
            ErrorKind::Validation | ErrorKind::InvalidState => self.message.clone(),
            ErrorKind::NotFound => "The requested item could not be found.".into(),
            ErrorKind::Conflict => {
                "This change conflicts with a recent update. Please refresh and try again.".into()
            }
            ErrorKind::RateLimited => "Too many requests. Please wait a moment and try again.".into(),
            ErrorKind::Serialization | ErrorKind::Deserialization => {
                "The server sent data the app could not read.".into()
            }
            ErrorKind::Internal | ErrorKind::Unknown => {
                "An unexpected error occurred. Please try again.".into()
            }
        }
    }

    /// `body` is the (already truncated) response text.
    #[must_use]
    pub fn from_http_status(status: u16, body: Option<&str>) -> Self {
        let kind = match status {
            400 | 422 => ErrorKind::Validation,
            401 => ErrorKind::Authentication,
            403 => ErrorKind::Authorization,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::Internal,
            _ => ErrorKind::Unknown,
        };

        let body = body.map(str::trim).filter(|b| !b.is_empty());
        let message = body
            .and_then(|b| serde_json::from_str::<ApiErrorResponse>(b).ok())
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .or_else(|| body.map(str::to_string))
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        let mut error = Self::new(kind, message);
        error.status = Some(status);
        error
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(status) = self.status {
            write!(f, " (status {status})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
}

pub type AppResult<T> = Result<T, AppError>;

impl From<HttpError> for AppError {
    fn from(e: HttpError) -> Self {
        let request_id = e.request_id().map(str::to_string);
        let error = match &e {
            HttpError::Status { status, body, .. } => {
                Self::from_http_status(*status, Some(body.as_str()))
            }
            HttpError::Transport { .. } => Self::new(ErrorKind::Network, e.to_string()),
            HttpError::InvalidResponse { .. } => Self::new(ErrorKind::Deserialization, e.to_string()),
            HttpError::Serialization { .. } => Self::new(ErrorKind::Serialization, e.to_string()),
            HttpError::InvalidUrl { .. } => Self::new(ErrorKind::Validation, e.to_string()),
            HttpError::BodyTooLarge { .. } | HttpError::InvalidRequest { .. } => {
                Self::new(ErrorKind::Internal, e.to_string()).with_severity(ErrorSeverity::Permanent)
            }
        };
        match request_id {
            Some(id) => error.with_context("request_id", id),
            None => error,
        }
    }
}

impl From<AdminError> for AppError {
    fn from(e: AdminError) -> Self {
        let kind = match e {
            AdminError::NoSelection
            | AdminError::NotEditing
            | AdminError::EditInProgress
            | AdminError::MutationPending => ErrorKind::InvalidState,
            AdminError::MissingId
            | AdminError::MissingEmail
            | AdminError::FieldNotEditable { .. }
            | AdminError::WrongValueKind { .. } => ErrorKind::Validation,
            AdminError::Encoding(_) => ErrorKind::Serialization,
        };
        Self::new(kind, e.to_string()).with_severity(ErrorSeverity::Permanent)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        let kind = match e {
            AuthError::InvalidEmail | AuthError::MissingPassword => ErrorKind::Validation,
            AuthError::LoginInProgress | AuthError::ProfileSaveInProgress => ErrorKind::InvalidState,
            AuthError::NotSignedIn => ErrorKind::Authentication,
            AuthError::NotAdmin => ErrorKind::Authorization,
        };
        Self::new(kind, e.to_string()).with_severity(ErrorSeverity::Permanent)
    }
}

impl From<RegistrationError> for AppError {
    fn from(e: RegistrationError) -> Self {
        let kind = match e {
            RegistrationError::WrongStep => ErrorKind::InvalidState,
            _ => ErrorKind::Validation,
        };
        Self::new(kind, e.to_string()).with_severity(ErrorSeverity::Permanent)
    }
}

impl From<MapError> for AppError {
    fn from(e: MapError) -> Self {
        let kind = match e {
            MapError::InvalidGeoJson(_) | MapError::NotAFeatureCollection => {
                ErrorKind::Deserialization
            }
            MapError::EmptyBoundary => ErrorKind::Validation,
        };
        Self::new(kind, e.to_string())
    }
}

impl From<SubmissionError> for AppError {
    fn from(e: SubmissionError) -> Self {
        let kind = match e {
            SubmissionError::InProgress => ErrorKind::InvalidState,
            _ => ErrorKind::Validation,
        };
        Self::new(kind, e.to_string()).with_severity(ErrorSeverity::Permanent)
    }
}

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        Self::new(ErrorKind::Validation, e.to_string())
    }
}

// --- Notifications ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            duration_ms: kind.default_duration_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 5000,
        }
    }
}

// --- View model ---

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFacingError {
    pub message: String,
    pub is_transient: bool,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_transient: e.severity == ErrorSeverity::Transient,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToastView {
    pub message: String,
    pub kind: ToastKind,
    pub duration_ms: u64,
}

impl From<&ToastMessage> for ToastView {
    fn from(t: &ToastMessage) -> Self {
        Self {
            message: t.message.clone(),
            kind: t.kind,
            duration_ms: t.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionView {
    pub signed_in: bool,
    pub is_admin: bool,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub is_login_pending: bool,
    pub is_profile_saving: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EditDialogView {
    pub entity: EntityType,
    pub fields: Vec<(EditField, FieldValue)>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AdminView {
    pub active_entity: EntityType,
    pub rows: Vec<RowItem>,
    pub is_loading: bool,
    pub selection: Option<Selection>,
    pub menu_open: bool,
    pub edit: Option<EditDialogView>,
    pub is_saving: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MarkerView {
    pub id: String,
    pub title: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MapView {
    /// Extracted city outline as GeoJSON text.
    pub boundary: Option<String>,
    pub lock: Option<BoundingBox>,
    pub camera: Camera,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub markers: Vec<MarkerView>,
    pub is_loading: bool,
    pub detail: DetailState,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistrationView {
    Profile {
        is_submitting: bool,
    },
    Commutes {
        email: String,
        commutes: Vec<Commute>,
        can_add: bool,
        max_commutes: usize,
        is_submitting: bool,
    },
    Done,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MyArtPiecesView {
    pub rows: Vec<RowItem>,
    pub is_loading: bool,
    pub is_submitting: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub screen: Screen,
    pub session: SessionView,
    pub admin: Option<AdminView>,
    pub map: MapView,
    pub registration: RegistrationView,
    pub my_art_pieces: MyArtPiecesView,
    pub error: Option<UserFacingError>,
    pub toast: Option<ToastView>,
}

pub mod app {
    use super::*;
    use tracing::{debug, info, warn};

    use crate::admin::{AdminPhase, SaveOutcome};
    use crate::api::{
        decode_echoed, decode_list, decode_optional, expect_success, AppUserRecord,
        ArtPieceDetails, ArtPieceRecord, CurrentUser, EchoedRow, Endpoint, MapPoint, RequestTicket,
        Resource,
    };
    use crate::capabilities::{http, HttpRequest, HttpResult, ValidatedUrl};
    use crate::entity::is_valid_id;
    use crate::registration::RegistrationStep;

    type TicketedEvent = fn(RequestTicket, Box<HttpResult>) -> Event;

    #[derive(Default)]
    pub struct App;

    impl App {
        fn report(model: &mut Model, error: impl Into<AppError>) {
            let error = error.into();
            warn!(code = error.code(), status = ?error.status, message = %error.message, "action failed");
            model.set_error(error);
        }

        /// Sends `request`, or reports why it could not be built.
        fn dispatch<F>(
            model: &mut Model,
            caps: &Capabilities,
            request: Result<HttpRequest, HttpError>,
            make_event: F,
        ) -> bool
        where
            F: FnOnce(HttpResult) -> Event + Send + 'static,
        {
            match request {
                Ok(request) => {
                    http::send(&caps.http, request, make_event);
                    true
                }
                Err(e) => {
                    Self::report(model, e);
                    false
                }
            }
        }

        /// Starts a cancellable fetch; any older fetch of `resource` is superseded.
        fn fetch(
            model: &mut Model,
            caps: &Capabilities,
            resource: Resource,
            endpoint: &Endpoint,
            wrap: TicketedEvent,
        ) {
            let ticket = model.requests.begin(resource);
            let request = endpoint.request(&model.config.api_base_url);
            let sent = Self::dispatch(model, caps, request, move |result| {
                wrap(ticket, Box::new(result))
            });
            if !sent {
                model.requests.cancel(resource);
            }
        }

        fn fetch_session(model: &mut Model, caps: &Capabilities) {
            Self::fetch(model, caps, Resource::Session, &Endpoint::Me, |ticket, result| {
                Event::SessionFetched { ticket, result }
            });
        }

        fn fetch_rows(model: &mut Model, caps: &Capabilities, entity: EntityType) {
            Self::fetch(
                model,
                caps,
                Resource::List(entity),
                &Endpoint::List(entity),
                |ticket, result| Event::RowsFetched { ticket, result },
            );
        }

        fn fetch_map_points(model: &mut Model, caps: &Capabilities) {
            model.map.begin_points();
            Self::fetch(model, caps, Resource::MapPoints, &Endpoint::MapPoints, |ticket, result| {
                Event::MapPointsFetched { ticket, result }
            });
            if !model.requests.is_in_flight(Resource::MapPoints) {
                model.map.points_failed();
            }
        }

        fn fetch_own_art_pieces(model: &mut Model, caps: &Capabilities) {
            model.own_art_pieces.begin_fetch();
            Self::fetch(
                model,
                caps,
                Resource::MyArtPieces,
                &Endpoint::MyArtPieces,
                |ticket, result| Event::MyArtPiecesFetched { ticket, result },
            );
            if !model.requests.is_in_flight(Resource::MyArtPieces) {
                model.own_art_pieces.fetch_stopped();
            }
        }

        /// Navigates to `screen` if the session allows it and starts its fetches.
        fn enter(model: &mut Model, caps: &Capabilities, screen: Screen) {
            if screen == Screen::Admin {
                if let Err(e) = model.auth.require_admin() {
                    Self::report(model, e);
                    return;
                }
            } else if screen.requires_session() {
                if let Err(e) = model.auth.require_user() {
                    Self::report(model, e);
                    model.navigate(Screen::Login);
                    return;
                }
            }

            model.navigate(screen);
            match screen {
                Screen::Map => Self::fetch_map_points(model, caps),
                Screen::Admin => {
                    let entity = model.admin.active_entity;
                    Self::fetch_rows(model, caps, entity);
                }
                Screen::MyArtPieces => Self::fetch_own_art_pieces(model, caps),
                _ => {}
            }
        }

        fn base(model: &Model) -> &ValidatedUrl {
            &model.config.api_base_url
        }

        fn decode_rows(entity: EntityType, result: HttpResult) -> Result<Vec<RowItem>, HttpError> {
            Ok(match entity {
                EntityType::Users => decode_list::<AppUserRecord>(result)?
                    .iter()
                    .map(AppUserRecord::to_row)
                    .collect(),
                EntityType::ArtPieces => decode_list::<ArtPieceRecord>(result)?
                    .iter()
                    .map(ArtPieceRecord::to_row)
                    .collect(),
            })
        }

        fn decode_echoed_row(entity: EntityType, result: HttpResult) -> Result<Option<EchoedRow>, HttpError> {
            Ok(match entity {
                EntityType::Users => decode_echoed::<AppUserRecord>(result)?.map(|r| r.echo()),
                EntityType::ArtPieces => decode_echoed::<ArtPieceRecord>(result)?.map(|r| r.echo()),
            })
        }

        fn handle_save(model: &mut Model, caps: &Capabilities) {
            let command = match model.admin.begin_save() {
                Ok(SaveOutcome::Unchanged) => {
                    model.show_toast("No changes to save.", ToastKind::Info);
                    return;
                }
                Ok(SaveOutcome::Send(command)) => command,
                Err(e) => return Self::report(model, e),
            };

            let entity = command.entity;
            let id = command.id.clone();
            match command
                .endpoint
                .request_with_json(Self::base(model), &command.payload)
            {
                Ok(request) => {
                    info!(%entity, id = %command.id, "saving row");
                    http::send(&caps.http, request, move |result| Event::SaveResponded {
                        entity,
                        id,
                        result: Box::new(result),
                    });
                }
                Err(e) => {
                    if let Err(e) = model.admin.finish_save(entity, &id, Err(e), &mut model.entities) {
                        Self::report(model, e);
                    }
                }
            }
        }

        fn handle_delete(model: &mut Model, caps: &Capabilities) {
            let command = match model.admin.begin_delete() {
                Ok(command) => command,
                Err(e) => return Self::report(model, e),
            };

            let entity = command.entity;
            let id = command.id.clone();
            match command.endpoint.request(Self::base(model)) {
                Ok(request) => {
                    info!(%entity, id = %command.id, "deleting row");
                    http::send(&caps.http, request, move |result| Event::DeleteResponded {
                        entity,
                        id,
                        result: Box::new(result),
                    });
                }
                Err(e) => {
                    if let Err(e) = model.admin.finish_delete(entity, &id, Err(e), &mut model.entities) {
                        Self::report(model, e);
                    }
                }
            }
        }

        fn build_admin_view(model: &Model) -> AdminView {
            let admin = &model.admin;
            let entity = admin.active_entity;
            AdminView {
                active_entity: entity,
                rows: model.entities.rows(entity).to_vec(),
                is_loading: model.requests.is_in_flight(Resource::List(entity)),
                selection: admin.selection().cloned(),
                menu_open: matches!(admin.phase(), AdminPhase::RowSelected(_)),
                edit: admin.form().map(|form| EditDialogView {
                    entity: form.entity(),
                    fields: form.fields(),
                }),
                is_saving: admin.pending().is_some(),
            }
        }

        fn build_map_view(model: &Model) -> MapView {
            let map = &model.map;
            MapView {
                boundary: map.boundary().and_then(|fc| serde_json::to_string(fc).ok()),
                lock: map.lock(),
                camera: map.camera(),
                min_zoom: crate::map::MIN_ZOOM,
                max_zoom: crate::map::MAX_ZOOM,
                markers: map
                    .markers()
                    .iter()
                    .map(|p| MarkerView {
                        id: p.id.clone(),
                        title: p.title.clone(),
                        lat: p.lat,
                        lng: p.lng,
                    })
                    .collect(),
                is_loading: map.is_loading_points(),
                detail: map.detail().clone(),
            }
        }

        fn build_registration_view(model: &Model) -> RegistrationView {
            let flow = &model.registration;
            match flow.step() {
                RegistrationStep::Profile => RegistrationView::Profile {
                    is_submitting: flow.is_submitting(),
                },
                RegistrationStep::Commutes { profile, commutes } => RegistrationView::Commutes {
                    email: profile.email.clone(),
                    commutes: commutes.clone(),
                    can_add: commutes.len() < MAX_COMMUTES,
                    max_commutes: MAX_COMMUTES,
                    is_submitting: flow.is_submitting(),
                },
                RegistrationStep::Done => RegistrationView::Done,
            }
        }

        fn session_view(model: &Model) -> SessionView {
            let auth = &model.auth;
            let user: Option<&CurrentUser> = auth.current_user();
            SessionView {
                signed_in: user.is_some(),
                is_admin: auth.is_admin(),
                display_name: user.map(CurrentUser::display_name),
                email: user.map(|u| u.email.clone()),
                is_login_pending: auth.is_login_pending(),
                is_profile_saving: auth.is_profile_saving(),
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            debug!(event = event.name(), "update");

            match event {
                Event::AppStarted => {
                    Self::fetch_session(model, caps);
                    let screen = model.screen;
                    Self::enter(model, caps, screen);
                }

                Event::BaseUrlConfigured { url } => match ValidatedUrl::new(url) {
                    Ok(base) => {
                        info!(base = base.as_str(), "backend base URL configured");
                        model.config.api_base_url = base;
                    }
                    Err(e) => Self::report(model, e),
                },

                Event::Navigated(screen) => Self::enter(model, caps, screen),

                Event::DismissError => model.clear_error(),
                Event::DismissToast => model.clear_toast(),

                // --- Auth ---
                Event::LoginSubmitted { email, password } => {
                    match model.auth.begin_login(&email, &password) {
                        Ok(login) => {
                            let request = Endpoint::Login.request_with_json(Self::base(model), &login);
                            if !Self::dispatch(model, caps, request, |result| {
                                Event::LoginResponded(Box::new(result))
                            }) {
                                model.auth.login_failed();
                            }
                        }
                        Err(e) => Self::report(model, e),
                    }
                }

                Event::LoginResponded(result) => match expect_success(*result) {
                    Ok(_) => {
                        info!("login accepted");
                        Self::fetch_session(model, caps);
                    }
                    Err(e) => {
                        model.auth.login_failed();
                        if e.is_unauthorized() {
                            Self::report(
                                model,
                                AppError::new(ErrorKind::Validation, "Incorrect email or password.")
                                    .with_context("http_status", "401"),
                            );
                        } else {
                            Self::report(model, e);
                        }
                    }
                },

                Event::SessionFetched { ticket, result } => {
                    if !model.requests.finish(ticket) {
                        return;
                    }
                    match decode_optional::<CurrentUser>(*result) {
                        Ok(user) => {
                            let signed_in = user.is_some();
                            model.auth.set_user(user);
                            if signed_in && model.screen == Screen::Login {
                                model.show_toast("Signed in.", ToastKind::Success);
                                Self::enter(model, caps, Screen::Map);
                            }
                        }
                        Err(e) if e.is_unauthorized() => {
                            debug!("no session cookie, browsing anonymously");
                            model.auth.set_user(None);
                        }
                        Err(e) => {
                            // The server failed, it did not say the cookie is gone.
                            model.auth.login_failed();
                            Self::report(model, e);
                        }
                    }
                }

                Event::LogoutRequested => {
                    let request = Endpoint::Logout.request(Self::base(model));
                    Self::dispatch(model, caps, request, |result| {
                        Event::LogoutResponded(Box::new(result))
                    });
                }

                Event::LogoutResponded(result) => match expect_success(*result) {
                    Ok(_) => {
                        model.clear_session_data();
                        if model.screen.requires_session() {
                            Self::enter(model, caps, Screen::Map);
                        }
                        model.show_toast("Signed out.", ToastKind::Info);
                    }
                    Err(e) if e.is_unauthorized() => {
                        model.clear_session_data();
                        if model.screen.requires_session() {
                            Self::enter(model, caps, Screen::Map);
                        }
                    }
                    Err(e) => Self::report(model, e),
                },

                // --- Registration ---
                Event::ProfileSubmitted(form) => match model.registration.submit_profile(&form) {
                    Ok(register) => {
                        let request = Endpoint::Register.request_with_json(Self::base(model), &register);
                        if !Self::dispatch(model, caps, request, |result| {
                            Event::ProfileResponded(Box::new(result))
                        }) {
                            model.registration.profile_rejected();
                        }
                    }
                    Err(e) => Self::report(model, e),
                },

                Event::ProfileResponded(result) => match expect_success(*result) {
                    Ok(_) => model.registration.profile_accepted(),
                    Err(e) => {
                        model.registration.profile_rejected();
                        Self::report(model, e);
                    }
                },

                Event::CommuteAdded(draft) => {
                    if let Err(e) = model.registration.add_commute(&draft) {
                        Self::report(model, e);
                    }
                }

                Event::CommuteRemoved { index } => {
                    if let Err(e) = model.registration.remove_commute(index) {
                        Self::report(model, e);
                    }
                }

                Event::CommutesSubmitted => match model.registration.submit_commutes() {
                    Ok(submission) => {
                        let request = submission
                            .endpoint
                            .request_with_json(Self::base(model), &submission.commute);
                        if !Self::dispatch(model, caps, request, |result| {
                            Event::CommuteResponded(Box::new(result))
                        }) {
                            model.registration.commutes_rejected();
                        }
                    }
                    Err(e) => Self::report(model, e),
                },

                Event::CommuteResponded(result) => match expect_success(*result) {
                    Ok(_) => {
                        model.registration.commutes_accepted();
                        model.show_toast("Registration complete. You can sign in now.", ToastKind::Success);
                        Self::enter(model, caps, Screen::Login);
                    }
                    Err(e) => {
                        model.registration.commutes_rejected();
                        Self::report(model, e);
                    }
                },

                // --- Admin lists ---
                Event::AdminOpened => Self::enter(model, caps, Screen::Admin),

                Event::AdminTabSelected(entity) => {
                    model.admin.select_tab(entity);
                    if model.screen == Screen::Admin {
                        Self::fetch_rows(model, caps, entity);
                    }
                }

                Event::RowsRefreshRequested(entity) => match model.auth.require_admin() {
                    Ok(_) => Self::fetch_rows(model, caps, entity),
                    Err(e) => Self::report(model, e),
                },

                Event::RowsFetched { ticket, result } => {
                    if !model.requests.finish(ticket) {
                        return;
                    }
                    let Resource::List(entity) = ticket.resource else {
                        warn!(resource = ?ticket.resource, "list response for a non-list resource");
                        return;
                    };
                    match Self::decode_rows(entity, *result) {
                        Ok(rows) => model.entities.replace_all(entity, rows),
                        Err(e) => Self::report(model, e),
                    }
                }

                // --- Admin selection & mutations ---
                Event::RowSelected { entity, id } => match model.entities.get(entity, &id).cloned() {
                    Some(item) => {
                        if let Err(e) = model.admin.select_row(entity, item) {
                            Self::report(model, e);
                        }
                    }
                    None => Self::report(
                        model,
                        AppError::new(ErrorKind::NotFound, "That row is no longer in the list.")
                            .with_context("entity", entity.label())
                            .with_context("id", id),
                    ),
                },

                Event::MenuDismissed | Event::EditCancelled => model.admin.dismiss(),

                Event::EditOpened => {
                    if let Err(e) = model.admin.open_edit() {
                        Self::report(model, e);
                    }
                }

                Event::EditFieldChanged { field, value } => {
                    if let Err(e) = model.admin.set_field(field, value) {
                        Self::report(model, e);
                    }
                }

                Event::EditSaved => Self::handle_save(model, caps),

                Event::SaveResponded { entity, id, result } => {
                    let outcome = Self::decode_echoed_row(entity, *result);
                    match model.admin.finish_save(entity, &id, outcome, &mut model.entities) {
                        Ok(()) => model.show_toast("Changes saved.", ToastKind::Success),
                        Err(e) => Self::report(model, e),
                    }
                }

                Event::DeleteConfirmed => Self::handle_delete(model, caps),

                Event::DeleteResponded { entity, id, result } => {
                    let outcome = expect_success(*result).map(|_| ());
                    match model.admin.finish_delete(entity, &id, outcome, &mut model.entities) {
                        Ok(()) => model.show_toast("Deleted.", ToastKind::Success),
                        Err(e) => Self::report(model, e),
                    }
                }

                // --- Map ---
                Event::BoundaryDataLoaded { geojson } => {
                    let city = model.config.city_name.clone();
                    if let Err(e) = model.map.load_boundary(&geojson, &city) {
                        Self::report(model, e);
                    }
                }

                Event::MapOpened => Self::enter(model, caps, Screen::Map),

                Event::MapPointsFetched { ticket, result } => {
                    if !model.requests.finish(ticket) {
                        return;
                    }
                    match decode_list::<MapPoint>(*result) {
                        Ok(points) => model.map.set_points(points),
                        Err(e) => {
                            model.map.points_failed();
                            Self::report(model, e);
                        }
                    }
                }

                Event::CameraMoved { center, zoom } => {
                    model.map.move_camera(center.lat(), center.lng(), zoom.value());
                }

                Event::MarkerClicked { id } => {
                    if !is_valid_id(&id) {
                        Self::report(model, AppError::new(ErrorKind::Validation, "This marker has no id."));
                        return caps.render.render();
                    }
                    model.map.open_detail(id.clone());
                    Self::fetch(
                        model,
                        caps,
                        Resource::MapDetail,
                        &Endpoint::MapPointDetail { id },
                        |ticket, result| Event::DetailFetched { ticket, result },
                    );
                    if !model.requests.is_in_flight(Resource::MapDetail) {
                        model.map.close_detail();
                    }
                }

                Event::DetailFetched { ticket, result } => {
                    if !model.requests.finish(ticket) {
                        return;
                    }
                    match decode_optional::<ArtPieceDetails>(*result) {
                        Ok(Some(details)) => {
                            model.map.detail_loaded(details);
                        }
                        Ok(None) => {
                            model.map.close_detail();
                            Self::report(
                                model,
                                AppError::new(ErrorKind::NotFound, "Art piece not found."),
                            );
                        }
                        Err(e) => {
                            model.map.close_detail();
                            Self::report(model, e);
                        }
                    }
                }

                Event::DetailClosed => {
                    model.map.close_detail();
                    model.requests.cancel(Resource::MapDetail);
                }

                // --- Own data ---
                Event::MyArtPiecesRequested => Self::enter(model, caps, Screen::MyArtPieces),

                Event::MyArtPiecesFetched { ticket, result } => {
                    if !model.requests.finish(ticket) {
                        return;
                    }
                    match decode_list::<ArtPieceRecord>(*result) {
                        Ok(records) => model.own_art_pieces.set_records(&records),
                        Err(e) => {
                            model.own_art_pieces.fetch_stopped();
                            Self::report(model, e);
                        }
                    }
                }

                Event::ArtPieceSubmitted(form) => {
                    if let Err(e) = model.auth.require_user() {
                        Self::report(model, e);
                        return caps.render.render();
                    }
                    match model.own_art_pieces.begin_submit(&form) {
                        Ok(new_piece) => {
                            let request =
                                Endpoint::AddArtPiece.request_with_json(Self::base(model), &new_piece);
                            if !Self::dispatch(model, caps, request, |result| {
                                Event::ArtPieceCreated(Box::new(result))
                            }) {
                                model.own_art_pieces.submit_failed();
                            }
                        }
                        Err(e) => Self::report(model, e),
                    }
                }

                Event::ArtPieceCreated(result) => match decode_echoed::<ArtPieceRecord>(*result) {
                    Ok(record) => {
                        model.own_art_pieces.submit_succeeded(record.as_ref());
                        model.show_toast("Art piece added.", ToastKind::Success);
                    }
                    Err(e) => {
                        model.own_art_pieces.submit_failed();
                        Self::report(model, e);
                    }
                },

                Event::OwnProfileSubmitted(form) => match model.auth.profile_update(&form) {
                    Ok(update) if update.is_empty() => {
                        model.show_toast("No changes to save.", ToastKind::Info);
                    }
                    Ok(update) => {
                        let request = Endpoint::UpdateMe.request_with_json(Self::base(model), &update);
                        if Self::dispatch(model, caps, request, |result| {
                            Event::OwnProfileResponded(Box::new(result))
                        }) {
                            model.auth.stage_profile_update(update);
                        }
                    }
                    Err(e) => Self::report(model, e),
                },

                Event::OwnProfileResponded(result) => match expect_success(*result) {
                    Ok(_) => {
                        model.auth.commit_profile_update();
                        model.show_toast("Profile updated.", ToastKind::Success);
                    }
                    Err(e) => {
                        model.auth.discard_profile_update();
                        Self::report(model, e);
                    }
                },
            }

            caps.render.render();
        }

        fn view(&self, model: &Model) -> ViewModel {
            let own = &model.own_art_pieces;

            ViewModel {
                screen: model.screen,
                session: Self::session_view(model),
                admin: (model.screen == Screen::Admin).then(|| Self::build_admin_view(model)),
                map: Self::build_map_view(model),
                registration: Self::build_registration_view(model),
                my_art_pieces: MyArtPiecesView {
                    rows: own.rows().to_vec(),
                    is_loading: own.is_loading(),
                    is_submitting: own.is_submitting(),
                },
                error: model.active_error.as_ref().map(UserFacingError::from),
                toast: model.active_toast.as_ref().map(ToastView::from),
            }
        }
    }
}
