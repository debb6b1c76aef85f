use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::admin::AdminState;
use crate::api::{RequestTracker, Resource};
use crate::auth::AuthState;
use crate::config::AppConfig;
use crate::entity::{EntityListCache, EntityType};
use crate::map::MapState;
use crate::registration::{RegistrationFlow, RegistrationStep};
use crate::submission::OwnArtPieces;
use crate::{AppError, ToastKind, ToastMessage};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Screen {
    #[default]
    Map,
    Login,
    Register,
    Admin,
    MyArtPieces,
    AddArtPiece,
    Profile,
}

impl Screen {
    /// Fetches started by this screen; leaving it cancels them.
    #[must_use]
    pub fn owned_resources(self) -> &'static [Resource] {
        match self {
            Self::Map => &[Resource::MapPoints, Resource::MapDetail],
            Self::Admin => &[
                Resource::List(EntityType::Users),
                Resource::List(EntityType::ArtPieces),
            ],
            Self::MyArtPieces => &[Resource::MyArtPieces],
            Self::Login | Self::Register | Self::AddArtPiece | Self::Profile => &[],
        }
    }

    #[must_use]
    pub const fn requires_session(self) -> bool {
        matches!(
            self,
            Self::Admin | Self::MyArtPieces | Self::AddArtPiece | Self::Profile
        )
    }
}

#[derive(Debug, Default)]
pub struct Model {
    pub config: AppConfig,
    pub screen: Screen,

    pub auth: AuthState,
    pub registration: RegistrationFlow,

    // Admin
    pub admin: AdminState,
    pub entities: EntityListCache,

    pub map: MapState,
    pub own_art_pieces: OwnArtPieces,

    pub requests: RequestTracker,

    pub active_error: Option<AppError>,
    pub active_toast: Option<ToastMessage>,
}

impl Model {
    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_toast(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.active_toast = Some(ToastMessage::new(message, kind));
    }

    pub fn clear_toast(&mut self) {
        self.active_toast = None;
    }

    /// Switches screens, cancelling fetches the old screen started and
    /// dropping its transient state. Returns false if already there.
    pub fn navigate(&mut self, screen: Screen) -> bool {
        let previous = self.screen;
        if previous == screen {
            return false;
        }
        for resource in previous.owned_resources() {
            self.requests.cancel(*resource);
        }
        match previous {
            Screen::Admin => self.admin.dismiss(),
            Screen::Map => self.map.leave(),
            Screen::MyArtPieces => self.own_art_pieces.fetch_stopped(),
            _ => {}
        }
        if screen == Screen::Register && matches!(self.registration.step(), RegistrationStep::Done) {
            self.registration.reset();
        }
        debug!(?previous, ?screen, "navigated");
        self.screen = screen;
        true
    }

    /// Forgets everything tied to the signed-in user.
    pub fn clear_session_data(&mut self) {
        self.auth.sign_out();
        self.admin = AdminState::default();
        self.entities.clear();
        self.own_art_pieces.clear();
        for entity in EntityType::ALL {
            self.requests.cancel(Resource::List(entity));
        }
        self.requests.cancel(Resource::MyArtPieces);
    }
}
