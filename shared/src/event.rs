use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

use crate::admin::{EditField, FieldValue, UserForm};
use crate::api::RequestTicket;
use crate::capabilities::HttpResult;
use crate::entity::EntityType;
use crate::model::Screen;
use crate::registration::{CommuteDraft, ProfileForm};
use crate::submission::NewArtPieceForm;

// --- Secret wrapper: redacts Debug, zeroizes on Drop ---

#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

// --- Coordinate: validated, NaN-safe ---

#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq)]
pub enum ValidationError {
    #[error("invalid coordinate: lat={0}, lng={1}")]
    InvalidCoordinate(f64, f64),
    #[error("invalid zoom: {0}")]
    InvalidZoom(f64),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        if !lat.is_finite()
            || !lng.is_finite()
            || !(-90.0..=90.0).contains(&lat)
            || !(-180.0..=180.0).contains(&lng)
        {
            return Err(ValidationError::InvalidCoordinate(lat, lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }
    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl PartialEq for Coordinate {
    fn eq(&self, other: &Self) -> bool {
        self.lat.to_bits() == other.lat.to_bits() && self.lng.to_bits() == other.lng.to_bits()
    }
}

impl Eq for Coordinate {}

// --- Zoom: any sane map zoom; the map view clamps further ---

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct Zoom(f64);

impl Zoom {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() || !(0.0..=25.0).contains(&value) {
            return Err(ValidationError::InvalidZoom(value));
        }
        Ok(Self(value))
    }
    pub fn value(&self) -> f64 {
        self.0
    }
}

// --- Event enum: no None variant, large variants boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Lifecycle & navigation
    AppStarted,
    BaseUrlConfigured {
        url: String,
    },
    Navigated(Screen),
    DismissError,
    DismissToast,

    // Auth
    LoginSubmitted {
        email: String,
        password: Secret,
    },
    LoginResponded(Box<HttpResult>),
    SessionFetched {
        ticket: RequestTicket,
        result: Box<HttpResult>,
    },
    LogoutRequested,
    LogoutResponded(Box<HttpResult>),

    // Registration
    ProfileSubmitted(Box<ProfileForm>),
    ProfileResponded(Box<HttpResult>),
    CommuteAdded(Box<CommuteDraft>),
    CommuteRemoved {
        index: usize,
    },
    CommutesSubmitted,
    CommuteResponded(Box<HttpResult>),

    // Admin lists
    AdminOpened,
    AdminTabSelected(EntityType),
    RowsRefreshRequested(EntityType),
    RowsFetched {
        ticket: RequestTicket,
        result: Box<HttpResult>,
    },

    // Admin selection & mutations
    RowSelected {
        entity: EntityType,
        id: String,
    },
    MenuDismissed,
    EditOpened,
    EditFieldChanged {
        field: EditField,
        value: FieldValue,
    },
    EditSaved,
    EditCancelled,
    SaveResponded {
        entity: EntityType,
        id: String,
        result: Box<HttpResult>,
    },
    DeleteConfirmed,
    DeleteResponded {
        entity: EntityType,
        id: String,
        result: Box<HttpResult>,
    },

    // Map
    BoundaryDataLoaded {
        geojson: String,
    },
    MapOpened,
    MapPointsFetched {
        ticket: RequestTicket,
        result: Box<HttpResult>,
    },
    CameraMoved {
        center: Coordinate,
        zoom: Zoom,
    },
    MarkerClicked {
        id: String,
    },
    DetailFetched {
        ticket: RequestTicket,
        result: Box<HttpResult>,
    },
    DetailClosed,

    // Own data
    MyArtPiecesRequested,
    MyArtPiecesFetched {
        ticket: RequestTicket,
        result: Box<HttpResult>,
    },
    ArtPieceSubmitted(Box<NewArtPieceForm>),
    ArtPieceCreated(Box<HttpResult>),
    OwnProfileSubmitted(Box<UserForm>),
    OwnProfileResponded(Box<HttpResult>),
}

impl Event {
    /// Stable variant name for log fields. Never includes payload data.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AppStarted => "app_started",
            Self::BaseUrlConfigured { .. } => "base_url_configured",
            Self::Navigated(_) => "navigated",
            Self::DismissError => "dismiss_error",
            Self::DismissToast => "dismiss_toast",
            Self::LoginSubmitted { .. } => "login_submitted",
            Self::LoginResponded(_) => "login_responded",
            Self::SessionFetched { .. } => "session_fetched",
            Self::LogoutRequested => "logout_requested",
            Self::LogoutResponded(_) => "logout_responded",
            Self::ProfileSubmitted(_) => "profile_submitted",
            Self::ProfileResponded(_) => "profile_responded",
            Self::CommuteAdded(_) => "commute_added",
            Self::CommuteRemoved { .. } => "commute_removed",
            Self::CommutesSubmitted => "commutes_submitted",
            Self::CommuteResponded(_) => "commute_responded",
            Self::AdminOpened => "admin_opened",
            Self::AdminTabSelected(_) => "admin_tab_selected",
            Self::RowsRefreshRequested(_) => "rows_refresh_requested",
            Self::RowsFetched { .. } => "rows_fetched",
            Self::RowSelected { .. } => "row_selected",
            Self::MenuDismissed => "menu_dismissed",
            Self::EditOpened => "edit_opened",
            Self::EditFieldChanged { .. } => "edit_field_changed",
            Self::EditSaved => "edit_saved",
            Self::EditCancelled => "edit_cancelled",
            Self::SaveResponded { .. } => "save_responded",
            Self::DeleteConfirmed => "delete_confirmed",
            Self::DeleteResponded { .. } => "delete_responded",
            Self::BoundaryDataLoaded { .. } => "boundary_data_loaded",
            Self::MapOpened => "map_opened",
            Self::MapPointsFetched { .. } => "map_points_fetched",
            Self::CameraMoved { .. } => "camera_moved",
            Self::MarkerClicked { .. } => "marker_clicked",
            Self::DetailFetched { .. } => "detail_fetched",
            Self::DetailClosed => "detail_closed",
            Self::MyArtPiecesRequested => "my_art_pieces_requested",
            Self::MyArtPiecesFetched { .. } => "my_art_pieces_fetched",
            Self::ArtPieceSubmitted(_) => "art_piece_submitted",
            Self::ArtPieceCreated(_) => "art_piece_created",
            Self::OwnProfileSubmitted(_) => "own_profile_submitted",
            Self::OwnProfileResponded(_) => "own_profile_responded",
        }
    }
}
