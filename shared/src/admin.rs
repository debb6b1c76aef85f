//! Admin dashboard: row selection, contextual menu, edit dialog and the
//! partial-update payloads it produces.
//!
//! ```text
//! Idle ──select_row──▶ RowSelected ──open_edit──▶ EditOpen
//!  ▲                     │    ▲                      │
//!  └──── delete ok ──────┘    └──── save failed ─────┤
//!  └────────────────── save ok / dismiss ────────────┘
//! ```
//!
//! Mutations are two-phase: `begin_*` validates and returns the request to
//! issue, `finish_*` applies the outcome to the list cache. A failed mutation
//! leaves both the phase and the cache untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{full_name, EchoedRow, Endpoint};
use crate::capabilities::HttpError;
use crate::entity::{is_valid_id, EntityListCache, EntityType, RowItem, RowPatch};

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdminError {
    #[error("no row is selected")]
    NoSelection,

    #[error("the edit dialog is not open")]
    NotEditing,

    #[error("close the edit dialog before selecting another row")]
    EditInProgress,

    #[error("the selected row has no valid id")]
    MissingId,

    #[error("the selected user has no known email address")]
    MissingEmail,

    #[error("another change is still being saved")]
    MutationPending,

    #[error("field {field:?} does not belong to the {entity} form")]
    FieldNotEditable { field: EditField, entity: EntityType },

    #[error("field {field:?} does not accept this kind of value")]
    WrongValueKind { field: EditField },

    #[error("could not encode the update: {0}")]
    Encoding(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub entity: EntityType,
    pub item: RowItem,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditField {
    FirstName,
    LastName,
    Email,
    HomeDistrict,
    Roles,
    Enabled,
    Title,
    Address,
    District,
    ArtPieceType,
    ArtPieceStyle,
    Description,
    TextLanguages,
    ContainsText,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
    Flag(bool),
}

// --- Forms ---

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub home_district: String,
    pub roles: Vec<String>,
    /// `None` until the user touches the toggle.
    pub enabled: Option<bool>,
}

impl UserForm {
    /// Only name and email are known from a row; the rest starts blank.
    pub fn seeded_from(item: &RowItem) -> Self {
        let name = item.name.trim();
        let (first_name, last_name) = match name.split_once(char::is_whitespace) {
            Some((first, last)) => (first.to_string(), last.trim().to_string()),
            None => (name.to_string(), String::new()),
        };
        Self {
            first_name,
            last_name,
            email: item.subtitle.clone().unwrap_or_default(),
            ..Self::default()
        }
    }

    fn set(&mut self, field: EditField, value: FieldValue) -> Result<(), AdminError> {
        match (field, value) {
            (EditField::FirstName, FieldValue::Text(v)) => self.first_name = v,
            (EditField::LastName, FieldValue::Text(v)) => self.last_name = v,
            (EditField::Email, FieldValue::Text(v)) => self.email = v,
            (EditField::HomeDistrict, FieldValue::Text(v)) => self.home_district = v,
            (EditField::Roles, FieldValue::List(v)) => self.roles = v,
            (EditField::Enabled, FieldValue::Flag(v)) => self.enabled = Some(v),
            (
                EditField::FirstName
                | EditField::LastName
                | EditField::Email
                | EditField::HomeDistrict
                | EditField::Roles
                | EditField::Enabled,
                _,
            ) => return Err(AdminError::WrongValueKind { field }),
            _ => {
                return Err(AdminError::FieldNotEditable {
                    field,
                    entity: EntityType::Users,
                })
            }
        }
        Ok(())
    }

    fn fields(&self) -> Vec<(EditField, FieldValue)> {
        vec![
            (EditField::FirstName, FieldValue::Text(self.first_name.clone())),
            (EditField::LastName, FieldValue::Text(self.last_name.clone())),
            (EditField::Email, FieldValue::Text(self.email.clone())),
            (EditField::HomeDistrict, FieldValue::Text(self.home_district.clone())),
            (EditField::Roles, FieldValue::List(self.roles.clone())),
            (EditField::Enabled, FieldValue::Flag(self.enabled.unwrap_or(true))),
        ]
    }

    /// Fields that differ from `seed` and carry a non-empty value.
    pub fn diff(&self, seed: &UserForm) -> AppUserUpdate {
        AppUserUpdate {
            first_name: changed_text(&seed.first_name, &self.first_name),
            last_name: changed_text(&seed.last_name, &self.last_name),
            email: changed_text(&seed.email, &self.email),
            home_district: changed_text(&seed.home_district, &self.home_district),
            roles: changed_list(&seed.roles, &self.roles),
            enabled: changed_flag(seed.enabled, self.enabled),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtPieceForm {
    pub title: String,
    pub address: String,
    pub district: String,
    pub art_piece_type: String,
    pub art_piece_style: String,
    pub description: String,
    pub text_languages: Vec<String>,
    pub contains_text: Option<bool>,
}

impl ArtPieceForm {
    pub fn seeded_from(item: &RowItem) -> Self {
        Self {
            title: item.name.clone(),
            address: item.subtitle.clone().unwrap_or_default(),
            ..Self::default()
        }
    }

    fn set(&mut self, field: EditField, value: FieldValue) -> Result<(), AdminError> {
        match (field, value) {
            (EditField::Title, FieldValue::Text(v)) => self.title = v,
            (EditField::Address, FieldValue::Text(v)) => self.address = v,
            (EditField::District, FieldValue::Text(v)) => self.district = v,
            (EditField::ArtPieceType, FieldValue::Text(v)) => self.art_piece_type = v,
            (EditField::ArtPieceStyle, FieldValue::Text(v)) => self.art_piece_style = v,
            (EditField::Description, FieldValue::Text(v)) => self.description = v,
            (EditField::TextLanguages, FieldValue::List(v)) => self.text_languages = v,
            (EditField::ContainsText, FieldValue::Flag(v)) => self.contains_text = Some(v),
            (
                EditField::Title
                | EditField::Address
                | EditField::District
                | EditField::ArtPieceType
                | EditField::ArtPieceStyle
                | EditField::Description
                | EditField::TextLanguages
                | EditField::ContainsText,
                _,
            ) => return Err(AdminError::WrongValueKind { field }),
            _ => {
                return Err(AdminError::FieldNotEditable {
                    field,
                    entity: EntityType::ArtPieces,
                })
            }
        }
        Ok(())
    }

    fn fields(&self) -> Vec<(EditField, FieldValue)> {
        vec![
            (EditField::Title, FieldValue::Text(self.title.clone())),
            (EditField::Address, FieldValue::Text(self.address.clone())),
            (EditField::District, FieldValue::Text(self.district.clone())),
            (EditField::ArtPieceType, FieldValue::Text(self.art_piece_type.clone())),
            (EditField::ArtPieceStyle, FieldValue::Text(self.art_piece_style.clone())),
            (EditField::Description, FieldValue::Text(self.description.clone())),
            (EditField::TextLanguages, FieldValue::List(self.text_languages.clone())),
            (EditField::ContainsText, FieldValue::Flag(self.contains_text.unwrap_or(false))),
        ]
    }

    pub fn diff(&self, seed: &ArtPieceForm) -> ArtPieceUpdate {
        ArtPieceUpdate {
            title: changed_text(&seed.title, &self.title),
            address: changed_text(&seed.address, &self.address),
            district: changed_text(&seed.district, &self.district),
            art_piece_type: changed_text(&seed.art_piece_type, &self.art_piece_type),
            art_piece_style: changed_text(&seed.art_piece_style, &self.art_piece_style),
            art_piece_user_description: changed_text(&seed.description, &self.description),
            text_languages: changed_list(&seed.text_languages, &self.text_languages),
            contains_text: changed_flag(seed.contains_text, self.contains_text),
        }
    }
}

// Blank values never become "clear this field" instructions.
fn changed_text(seed: &str, current: &str) -> Option<String> {
    let current = current.trim();
    (!current.is_empty() && current != seed.trim()).then(|| current.to_string())
}

fn changed_list(seed: &[String], current: &[String]) -> Option<Vec<String>> {
    let cleaned: Vec<String> = current
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    (!cleaned.is_empty() && cleaned != seed).then_some(cleaned)
}

fn changed_flag(seed: Option<bool>, current: Option<bool>) -> Option<bool> {
    current.filter(|v| seed != Some(*v))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditForm {
    User { seed: UserForm, current: UserForm },
    ArtPiece { seed: ArtPieceForm, current: ArtPieceForm },
}

impl EditForm {
    pub fn seeded(selection: &Selection) -> Self {
        match selection.entity {
            EntityType::Users => {
                let seed = UserForm::seeded_from(&selection.item);
                Self::User {
                    current: seed.clone(),
                    seed,
                }
            }
            EntityType::ArtPieces => {
                let seed = ArtPieceForm::seeded_from(&selection.item);
                Self::ArtPiece {
                    current: seed.clone(),
                    seed,
                }
            }
        }
    }

    pub fn entity(&self) -> EntityType {
        match self {
            Self::User { .. } => EntityType::Users,
            Self::ArtPiece { .. } => EntityType::ArtPieces,
        }
    }

    pub fn set(&mut self, field: EditField, value: FieldValue) -> Result<(), AdminError> {
        match self {
            Self::User { current, .. } => current.set(field, value),
            Self::ArtPiece { current, .. } => current.set(field, value),
        }
    }

    pub fn fields(&self) -> Vec<(EditField, FieldValue)> {
        match self {
            Self::User { current, .. } => current.fields(),
            Self::ArtPiece { current, .. } => current.fields(),
        }
    }

    pub fn payload(&self) -> UpdatePayload {
        match self {
            Self::User { seed, current } => UpdatePayload::User(current.diff(seed)),
            Self::ArtPiece { seed, current } => UpdatePayload::ArtPiece(current.diff(seed)),
        }
    }
}

// --- Payloads ---

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl AppUserUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Display fields the row would show once this update is applied.
    pub fn row_patch(&self, seed: &UserForm) -> RowPatch {
        let name = if self.first_name.is_some() || self.last_name.is_some() {
            full_name(
                self.first_name.as_deref().unwrap_or(&seed.first_name),
                self.last_name.as_deref().unwrap_or(&seed.last_name),
            )
        } else {
            None
        };
        RowPatch {
            name,
            subtitle: self.email.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtPieceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_piece_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_piece_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_piece_user_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_languages: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains_text: Option<bool>,
}

impl ArtPieceUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn row_patch(&self) -> RowPatch {
        RowPatch {
            name: self.title.clone(),
            subtitle: self.address.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdatePayload {
    User(AppUserUpdate),
    ArtPiece(ArtPieceUpdate),
}

impl UpdatePayload {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::User(update) => update.is_empty(),
            Self::ArtPiece(update) => update.is_empty(),
        }
    }
}

// --- State machine ---

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminPhase {
    #[default]
    Idle,
    RowSelected(Selection),
    EditOpen { selection: Selection, form: EditForm },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingMutation {
    Delete {
        entity: EntityType,
        id: String,
    },
    Save {
        entity: EntityType,
        id: String,
        optimistic: RowPatch,
    },
}

/// What the caller must send to the backend for a delete.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeleteCommand {
    pub entity: EntityType,
    pub id: String,
    pub endpoint: Endpoint,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SaveCommand {
    pub entity: EntityType,
    pub id: String,
    pub endpoint: Endpoint,
    pub payload: UpdatePayload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing changed; the dialog closed without a request.
    Unchanged,
    Send(SaveCommand),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminState {
    pub active_entity: EntityType,
    phase: AdminPhase,
    pending: Option<PendingMutation>,
}

impl AdminState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> &AdminPhase {
        &self.phase
    }

    pub fn selection(&self) -> Option<&Selection> {
        match &self.phase {
            AdminPhase::Idle => None,
            AdminPhase::RowSelected(selection) | AdminPhase::EditOpen { selection, .. } => {
                Some(selection)
            }
        }
    }

    pub fn form(&self) -> Option<&EditForm> {
        match &self.phase {
            AdminPhase::EditOpen { form, .. } => Some(form),
            _ => None,
        }
    }

    pub fn pending(&self) -> Option<&PendingMutation> {
        self.pending.as_ref()
    }

    pub fn select_tab(&mut self, entity: EntityType) {
        if self.active_entity != entity {
            self.active_entity = entity;
            self.phase = AdminPhase::Idle;
        }
    }

    pub fn select_row(&mut self, entity: EntityType, item: RowItem) -> Result<(), AdminError> {
        if matches!(self.phase, AdminPhase::EditOpen { .. }) {
            return Err(AdminError::EditInProgress);
        }
        debug!(%entity, id = %item.id, "row selected");
        self.active_entity = entity;
        self.phase = AdminPhase::RowSelected(Selection { entity, item });
        Ok(())
    }

    pub fn open_edit(&mut self) -> Result<(), AdminError> {
        let AdminPhase::RowSelected(selection) = &self.phase else {
            return Err(AdminError::NoSelection);
        };
        let form = EditForm::seeded(selection);
        self.phase = AdminPhase::EditOpen {
            selection: selection.clone(),
            form,
        };
        Ok(())
    }

    pub fn set_field(&mut self, field: EditField, value: FieldValue) -> Result<(), AdminError> {
        match &mut self.phase {
            AdminPhase::EditOpen { form, .. } => form.set(field, value),
            _ => Err(AdminError::NotEditing),
        }
    }

    pub fn dismiss(&mut self) {
        if !matches!(self.phase, AdminPhase::Idle) {
            debug!("admin menu dismissed");
        }
        self.phase = AdminPhase::Idle;
    }

    pub fn begin_delete(&mut self) -> Result<DeleteCommand, AdminError> {
        let AdminPhase::RowSelected(selection) = &self.phase else {
            return Err(AdminError::NoSelection);
        };
        if self.pending.is_some() {
            return Err(AdminError::MutationPending);
        }
        if !selection.item.has_valid_id() {
            warn!(entity = %selection.entity, "refusing delete without a valid id");
            return Err(AdminError::MissingId);
        }

        let entity = selection.entity;
        let id = selection.item.id.clone();
        self.pending = Some(PendingMutation::Delete {
            entity,
            id: id.clone(),
        });
        Ok(DeleteCommand {
            entity,
            endpoint: Endpoint::Remove {
                entity,
                id: id.clone(),
            },
            id,
        })
    }

    pub fn finish_delete(
        &mut self,
        entity: EntityType,
        id: &str,
        result: Result<(), HttpError>,
        cache: &mut EntityListCache,
    ) -> Result<(), HttpError> {
        self.clear_pending(entity, id);
        result?;

        cache.remove_one(entity, id);
        info!(%entity, id, "row deleted");
        if self.targets(entity, id) {
            self.phase = AdminPhase::Idle;
        }
        Ok(())
    }

    pub fn begin_save(&mut self) -> Result<SaveOutcome, AdminError> {
        let AdminPhase::EditOpen { selection, form } = &self.phase else {
            return Err(AdminError::NotEditing);
        };
        if self.pending.is_some() {
            return Err(AdminError::MutationPending);
        }
        if !selection.item.has_valid_id() {
            return Err(AdminError::MissingId);
        }

        let entity = selection.entity;
        let id = selection.item.id.clone();
        let (endpoint, payload, optimistic) = match form {
            EditForm::User { seed, current } => {
                let update = current.diff(seed);
                let optimistic = update.row_patch(seed);
                let endpoint = Endpoint::UpdateUser {
                    email: seed.email.trim().to_string(),
                };
                (endpoint, UpdatePayload::User(update), optimistic)
            }
            EditForm::ArtPiece { seed, current } => {
                let update = current.diff(seed);
                let optimistic = update.row_patch();
                let endpoint = Endpoint::UpdateArtPiece { id: id.clone() };
                (endpoint, UpdatePayload::ArtPiece(update), optimistic)
            }
        };

        if payload.is_empty() {
            debug!(%entity, %id, "nothing changed, closing editor");
            self.phase = AdminPhase::Idle;
            return Ok(SaveOutcome::Unchanged);
        }
        if let Endpoint::UpdateUser { email } = &endpoint {
            if !is_valid_id(email) {
                return Err(AdminError::MissingEmail);
            }
        }

        self.pending = Some(PendingMutation::Save {
            entity,
            id: id.clone(),
            optimistic,
        });
        Ok(SaveOutcome::Send(SaveCommand {
            entity,
            id,
            endpoint,
            payload,
        }))
    }

    /// `result` carries the display fields the server echoed back, if any.
    /// Echoed values win; anything the echo lacks comes from the sent payload.
    pub fn finish_save(
        &mut self,
        entity: EntityType,
        id: &str,
        result: Result<Option<EchoedRow>, HttpError>,
        cache: &mut EntityListCache,
    ) -> Result<(), HttpError> {
        let optimistic = match self.clear_pending(entity, id) {
            Some(PendingMutation::Save { optimistic, .. }) => optimistic,
            _ => RowPatch::default(),
        };

        let patch = match result? {
            Some(echo) if echo.id == id => echo.patch.or(optimistic),
            Some(echo) => {
                warn!(%entity, id, echoed = %echo.id, "save response describes another row, ignoring it");
                optimistic
            }
            None => optimistic,
        };
        if !patch.is_empty() {
            cache.patch_one(entity, id, &patch);
        }
        info!(%entity, id, "row updated");

        if self.targets(entity, id) {
            self.phase = AdminPhase::Idle;
        }
        Ok(())
    }

    fn clear_pending(&mut self, entity: EntityType, id: &str) -> Option<PendingMutation> {
        let matches = match &self.pending {
            Some(PendingMutation::Delete { entity: e, id: i } | PendingMutation::Save { entity: e, id: i, .. }) => {
                *e == entity && i == id
            }
            None => false,
        };
        if matches {
            self.pending.take()
        } else {
            None
        }
    }

    fn targets(&self, entity: EntityType, id: &str) -> bool {
        self.selection()
            .is_some_and(|s| s.entity == entity && s.item.id == id)
    }
}
