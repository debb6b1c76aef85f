//! Backend REST surface: endpoint table, wire schemas and response decoding.
//!
//! Every response is validated against an explicit schema here, so the rest of
//! the core only ever sees typed records or a typed `HttpError`.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::capabilities::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpResult, ValidatedUrl};
use crate::entity::{EntityType, RowItem, RowPatch};
use crate::event::Secret;

pub const ADMIN_ROLES: &[&str] = &["ADMIN", "ROLE_ADMIN"];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endpoint {
    Login,
    Register,
    AddCommute { email: String },
    Logout,
    Me,
    List(EntityType),
    UpdateUser { email: String },
    UpdateMe,
    UpdateArtPiece { id: String },
    Remove { entity: EntityType, id: String },
    MapPoints,
    MapPointDetail { id: String },
    MyArtPieces,
    AddArtPiece,
}

impl Endpoint {
    #[must_use]
    pub fn method(&self) -> HttpMethod {
        match self {
            Self::Login | Self::Register | Self::AddCommute { .. } | Self::Logout | Self::AddArtPiece => {
                HttpMethod::Post
            }
            Self::Me | Self::List(_) | Self::MapPoints | Self::MapPointDetail { .. } | Self::MyArtPieces => {
                HttpMethod::Get
            }
            Self::UpdateUser { .. } | Self::UpdateMe | Self::UpdateArtPiece { .. } => HttpMethod::Put,
            Self::Remove { .. } => HttpMethod::Delete,
        }
    }

    fn segments(&self) -> Vec<&str> {
        match self {
            Self::Login => vec!["auth", "login"],
            Self::Register => vec!["auth", "register"],
            Self::AddCommute { .. } => vec!["auth", "addCommute"],
            Self::Logout => vec!["auth", "logout"],
            Self::Me => vec!["auth", "me"],
            Self::List(EntityType::Users) => vec!["getAll", "appUsers"],
            Self::List(EntityType::ArtPieces) => vec!["getAll", "artPieces"],
            Self::UpdateUser { .. } => vec!["updateAppUser", "user"],
            Self::UpdateMe => vec!["updateAppUser", "me"],
            Self::UpdateArtPiece { id } => vec!["updateArtPiece", "artPiece", id.as_str()],
            Self::Remove { entity: EntityType::Users, id } => vec!["remove", "appUser", id.as_str()],
            Self::Remove { entity: EntityType::ArtPieces, id } => vec!["remove", "artPiece", id.as_str()],
            Self::MapPoints => vec!["map", "artPieces"],
            Self::MapPointDetail { id } => vec!["map", "artPieces", id.as_str()],
            Self::MyArtPieces => vec!["my", "artPieces"],
            Self::AddArtPiece => vec!["addNew", "addArtPiece"],
        }
    }

    fn query(&self) -> Option<(&'static str, &str)> {
        match self {
            Self::AddCommute { email } | Self::UpdateUser { email } => Some(("appUserEmail", email.as_str())),
            _ => None,
        }
    }

    pub fn url(&self, base: &ValidatedUrl) -> Result<String, HttpError> {
        base.join(&self.segments(), self.query())
    }

    pub fn request(&self, base: &ValidatedUrl) -> Result<HttpRequest, HttpError> {
        Ok(HttpRequest::new(self.method(), self.url(base)?))
    }

    pub fn request_with_json<T: Serialize>(
        &self,
        base: &ValidatedUrl,
        body: &T,
    ) -> Result<HttpRequest, HttpError> {
        self.request(base)?.with_json(body)
    }
}

// --- Request generations ---

/// A fetch whose response can be superseded by a newer fetch of the same kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    Session,
    List(EntityType),
    MapPoints,
    MapDetail,
    MyArtPieces,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestTicket {
    pub resource: Resource,
    pub generation: u64,
}

/// The shell cannot un-send a request, so cancellation means forgetting it:
/// each resource carries a generation and only the newest ticket is accepted.
#[derive(Clone, Debug, Default)]
pub struct RequestTracker {
    generations: HashMap<Resource, u64>,
    in_flight: HashSet<Resource>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, resource: Resource) -> RequestTicket {
        let generation = self.generations.entry(resource).or_insert(0);
        *generation += 1;
        if !self.in_flight.insert(resource) {
            debug!(?resource, generation = *generation, "superseding in-flight request");
        }
        RequestTicket {
            resource,
            generation: *generation,
        }
    }

    /// Accepts the response for `ticket` if it is still the newest one.
    pub fn finish(&mut self, ticket: RequestTicket) -> bool {
        if self.is_current(ticket) {
            self.in_flight.remove(&ticket.resource);
            true
        } else {
            debug!(resource = ?ticket.resource, generation = ticket.generation, "dropping stale response");
            false
        }
    }

    pub fn cancel(&mut self, resource: Resource) {
        if self.in_flight.remove(&resource) {
            *self.generations.entry(resource).or_insert(0) += 1;
            debug!(?resource, "request cancelled");
        }
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.in_flight.contains(&ticket.resource)
            && self.generations.get(&ticket.resource) == Some(&ticket.generation)
    }

    pub fn is_in_flight(&self, resource: Resource) -> bool {
        self.in_flight.contains(&resource)
    }

    pub fn current(&self, resource: Resource) -> Option<RequestTicket> {
        self.is_in_flight(resource).then(|| RequestTicket {
            resource,
            generation: self.generations.get(&resource).copied().unwrap_or_default(),
        })
    }
}

// --- Response decoding ---

pub fn expect_success(result: HttpResult) -> Result<HttpResponse, HttpError> {
    result?.error_for_status()
}

/// A 2xx with an empty body is an empty list.
pub fn decode_list<T: DeserializeOwned>(result: HttpResult) -> Result<Vec<T>, HttpError> {
    let response = expect_success(result)?;
    Ok(response.json_opt::<Vec<T>>()?.unwrap_or_default())
}

/// A 2xx with an empty body is `None`.
pub fn decode_optional<T: DeserializeOwned>(result: HttpResult) -> Result<Option<T>, HttpError> {
    expect_success(result)?.json_opt()
}

/// Mutation responses are not guaranteed to echo the record back; anything
/// that does not parse as `T` is treated as "no record".
pub fn decode_echoed<T: DeserializeOwned>(result: HttpResult) -> Result<Option<T>, HttpError> {
    let response = expect_success(result)?;
    match response.json_opt::<T>() {
        Ok(record) => Ok(record),
        Err(e) => {
            debug!(request_id = response.request_id(), error = %e, "mutation response carried no record");
            Ok(None)
        }
    }
}

fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

/// Missing, null or unparseable coordinates become NaN and are filtered later.
fn de_coord<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

fn nan() -> f64 {
    f64::NAN
}

fn is_admin_role(role: &str) -> bool {
    ADMIN_ROLES.iter().any(|admin| role.eq_ignore_ascii_case(admin))
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

// --- Wire schemas ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUserRecord {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub home_district: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl AppUserRecord {
    #[must_use]
    pub fn display_name(&self) -> String {
        full_name(&self.first_name, &self.last_name).unwrap_or_else(|| self.email.clone())
    }

    #[must_use]
    pub fn to_row(&self) -> RowItem {
        RowItem::new(
            self.id.clone(),
            self.display_name(),
            non_empty(&self.email).map(str::to_string),
        )
    }

    /// Display fields carried by a mutation response. Blank fields stay `None`.
    #[must_use]
    pub fn echo(&self) -> EchoedRow {
        EchoedRow {
            id: self.id.clone(),
            patch: RowPatch {
                name: full_name(&self.first_name, &self.last_name),
                subtitle: non_empty(&self.email).map(str::to_string),
            },
        }
    }
}

pub(crate) fn full_name(first: &str, last: &str) -> Option<String> {
    match (non_empty(first), non_empty(last)) {
        (Some(first), Some(last)) => Some(format!("{first} {last}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtPieceRecord {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub art_piece_type: Option<String>,
    #[serde(default)]
    pub art_piece_style: Option<String>,
    #[serde(default)]
    pub art_piece_user_description: Option<String>,
    #[serde(default)]
    pub text_languages: Vec<String>,
    #[serde(default)]
    pub contains_text: Option<bool>,
}

impl ArtPieceRecord {
    #[must_use]
    pub fn to_row(&self) -> RowItem {
        RowItem::new(
            self.id.clone(),
            self.title.clone(),
            non_empty(&self.address).map(str::to_string),
        )
    }

    #[must_use]
    pub fn echo(&self) -> EchoedRow {
        EchoedRow {
            id: self.id.clone(),
            patch: RowPatch {
                name: non_empty(&self.title).map(str::to_string),
                subtitle: non_empty(&self.address).map(str::to_string),
            },
        }
    }
}

/// The row a mutation response describes, reduced to the display fields it
/// actually carried.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EchoedRow {
    pub id: String,
    pub patch: RowPatch,
}

/// Marker projection from `/map/artPieces`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default = "nan", deserialize_with = "de_coord")]
    pub lat: f64,
    #[serde(default = "nan", deserialize_with = "de_coord")]
    pub lng: f64,
}

impl MapPoint {
    #[must_use]
    pub fn has_finite_position(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtPieceDetails {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub art_piece_type: Option<String>,
    #[serde(default)]
    pub art_piece_style: Option<String>,
    #[serde(default)]
    pub art_piece_user_description: Option<String>,
    #[serde(default)]
    pub text_languages: Vec<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    #[serde(default = "nan", deserialize_with = "de_coord")]
    pub lat: f64,
    #[serde(default = "nan", deserialize_with = "de_coord")]
    pub lng: f64,
}

/// `/auth/me`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub home_district: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl CurrentUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| is_admin_role(role))
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        full_name(&self.first_name, &self.last_name).unwrap_or_else(|| self.email.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: Secret,
}
