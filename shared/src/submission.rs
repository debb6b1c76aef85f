use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::api::ArtPieceRecord;
use crate::entity::RowItem;
use crate::event::{Coordinate, ValidationError};

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
pub enum SubmissionError {
    #[error("{field} is required")]
    Required { field: String },

    #[error(transparent)]
    Location(#[from] ValidationError),

    #[error("the previous art piece is still being submitted")]
    InProgress,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewArtPieceForm {
    pub title: String,
    pub address: String,
    pub district: String,
    pub art_piece_type: String,
    pub art_piece_style: String,
    pub description: String,
    pub text_languages: Vec<String>,
    pub contains_text: bool,
    pub lat: f64,
    pub lng: f64,
}

/// `POST /addNew/addArtPiece`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArtPieceRequest {
    pub title: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_piece_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_piece_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub art_piece_user_description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub text_languages: Vec<String>,
    pub contains_text: bool,
    pub lat: f64,
    pub lng: f64,
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl NewArtPieceForm {
    pub fn validate(&self) -> Result<NewArtPieceRequest, SubmissionError> {
        let title = optional(&self.title).ok_or_else(|| SubmissionError::Required {
            field: "title".into(),
        })?;
        let address = optional(&self.address).ok_or_else(|| SubmissionError::Required {
            field: "address".into(),
        })?;
        let location = Coordinate::new(self.lat, self.lng)?;

        Ok(NewArtPieceRequest {
            title,
            address,
            district: optional(&self.district),
            art_piece_type: optional(&self.art_piece_type),
            art_piece_style: optional(&self.art_piece_style),
            art_piece_user_description: optional(&self.description),
            text_languages: self
                .text_languages
                .iter()
                .filter_map(|lang| optional(lang))
                .collect(),
            contains_text: self.contains_text,
            lat: location.lat(),
            lng: location.lng(),
        })
    }
}

/// The signed-in user's own art pieces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OwnArtPieces {
    rows: Vec<RowItem>,
    loading: bool,
    submitting: bool,
}

impl OwnArtPieces {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[RowItem] {
        &self.rows
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn begin_fetch(&mut self) {
        self.loading = true;
    }

    pub fn set_records(&mut self, records: &[ArtPieceRecord]) {
        self.rows = records.iter().map(ArtPieceRecord::to_row).collect();
        self.loading = false;
        debug!(count = self.rows.len(), "own art pieces loaded");
    }

    pub fn fetch_stopped(&mut self) {
        self.loading = false;
    }

    pub fn begin_submit(&mut self, form: &NewArtPieceForm) -> Result<NewArtPieceRequest, SubmissionError> {
        if self.submitting {
            return Err(SubmissionError::InProgress);
        }
        let request = form.validate()?;
        self.submitting = true;
        Ok(request)
    }

    /// Appends the server's record when it echoed one back.
    pub fn submit_succeeded(&mut self, created: Option<&ArtPieceRecord>) {
        self.submitting = false;
        if let Some(record) = created {
            let row = record.to_row();
            if row.has_valid_id() && !self.rows.iter().any(|r| r.id == row.id) {
                self.rows.push(row);
            }
        }
    }

    pub fn submit_failed(&mut self) {
        self.submitting = false;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
