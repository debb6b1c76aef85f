use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::api::Endpoint;
use crate::event::Secret;

pub const MAX_COMMUTES: usize = 7;
pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_TRIPS_PER_WEEK: u32 = 50;
pub const MAX_HOUR: u8 = 23;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("enter a valid email address")]
    InvalidEmail,

    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("at most {max} commutes can be added")]
    LimitReached { max: usize },

    #[error("trips per week must be between 1 and {max}, got {value}")]
    TripsOutOfRange { value: u32, max: u32 },

    #[error("{field} must be an hour between 0 and 23, got {value}")]
    HourOutOfRange { field: String, value: u8 },

    #[error("choose at least one means of transport")]
    NoTransportMode,

    #[error("add at least one commute before finishing")]
    NoCommutes,

    #[error("no commute at position {index}")]
    NoSuchCommute { index: usize },

    #[error("this step is not available right now")]
    WrongStep,
}

fn required(field: &str, value: &str) -> Result<(), RegistrationError> {
    if value.trim().is_empty() {
        return Err(RegistrationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    match email.trim().split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    }
}

// --- Step one ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: Secret,
    pub home_district: String,
}

/// `POST /auth/register`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: Secret,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_district: Option<String>,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<RegisterRequest, RegistrationError> {
        required("first name", &self.first_name)?;
        required("last name", &self.last_name)?;
        required("email", &self.email)?;
        if !is_valid_email(&self.email) {
            return Err(RegistrationError::InvalidEmail);
        }
        if self.password.expose().chars().count() < MIN_PASSWORD_LEN {
            return Err(RegistrationError::PasswordTooShort {
                min: MIN_PASSWORD_LEN,
            });
        }

        let home_district = self.home_district.trim();
        Ok(RegisterRequest {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            home_district: (!home_district.is_empty()).then(|| home_district.to_string()),
        })
    }
}

// --- Step two ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    Walk,
    Bike,
    Scooter,
    Bus,
    Tram,
    Train,
    Car,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommuteDraft {
    pub district: String,
    pub trips_per_week: u32,
    pub start_hour: u8,
    pub end_hour: u8,
    pub transport_modes: Vec<TransportMode>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commute {
    pub district: String,
    pub trips_per_week: u32,
    pub start_hour: u8,
    pub end_hour: u8,
    pub transport_modes: Vec<TransportMode>,
}

impl CommuteDraft {
    pub fn validate(&self) -> Result<Commute, RegistrationError> {
        required("district", &self.district)?;
        if !(1..=MAX_TRIPS_PER_WEEK).contains(&self.trips_per_week) {
            return Err(RegistrationError::TripsOutOfRange {
                value: self.trips_per_week,
                max: MAX_TRIPS_PER_WEEK,
            });
        }
        for (field, value) in [("start hour", self.start_hour), ("end hour", self.end_hour)] {
            if value > MAX_HOUR {
                return Err(RegistrationError::HourOutOfRange {
                    field: field.to_string(),
                    value,
                });
            }
        }

        let mut modes: Vec<TransportMode> = Vec::with_capacity(self.transport_modes.len());
        for mode in &self.transport_modes {
            if !modes.contains(mode) {
                modes.push(*mode);
            }
        }
        if modes.is_empty() {
            return Err(RegistrationError::NoTransportMode);
        }

        Ok(Commute {
            district: self.district.trim().to_string(),
            trips_per_week: self.trips_per_week,
            start_hour: self.start_hour,
            end_hour: self.end_hour,
            transport_modes: modes,
        })
    }
}

// --- Flow ---

/// Step-one data lives only in memory; a reload starts over.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RegistrationStep {
    #[default]
    Profile,
    Commutes {
        profile: Box<RegisterRequest>,
        commutes: Vec<Commute>,
    },
    Done,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CommuteSubmission {
    pub endpoint: Endpoint,
    pub commute: Commute,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistrationFlow {
    step: RegistrationStep,
    /// Step-one payload awaiting the server's answer.
    pending_profile: Option<Box<RegisterRequest>>,
    submitting: bool,
}

impl RegistrationFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> &RegistrationStep {
        &self.step
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn commutes(&self) -> &[Commute] {
        match &self.step {
            RegistrationStep::Commutes { commutes, .. } => commutes,
            _ => &[],
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn submit_profile(&mut self, form: &ProfileForm) -> Result<RegisterRequest, RegistrationError> {
        if self.submitting || !matches!(self.step, RegistrationStep::Profile) {
            return Err(RegistrationError::WrongStep);
        }
        let request = form.validate()?;
        self.pending_profile = Some(Box::new(request.clone()));
        self.submitting = true;
        Ok(request)
    }

    pub fn profile_accepted(&mut self) {
        self.submitting = false;
        if let Some(profile) = self.pending_profile.take() {
            info!("registration profile accepted");
            self.step = RegistrationStep::Commutes {
                profile,
                commutes: Vec::new(),
            };
        }
    }

    pub fn profile_rejected(&mut self) {
        self.submitting = false;
        self.pending_profile = None;
    }

    pub fn add_commute(&mut self, draft: &CommuteDraft) -> Result<(), RegistrationError> {
        let RegistrationStep::Commutes { commutes, .. } = &mut self.step else {
            return Err(RegistrationError::WrongStep);
        };
        if commutes.len() >= MAX_COMMUTES {
            return Err(RegistrationError::LimitReached { max: MAX_COMMUTES });
        }
        commutes.push(draft.validate()?);
        debug!(count = commutes.len(), "commute added");
        Ok(())
    }

    pub fn remove_commute(&mut self, index: usize) -> Result<Commute, RegistrationError> {
        let RegistrationStep::Commutes { commutes, .. } = &mut self.step else {
            return Err(RegistrationError::WrongStep);
        };
        if index >= commutes.len() {
            return Err(RegistrationError::NoSuchCommute { index });
        }
        Ok(commutes.remove(index))
    }

    /// Only the most recently added commute is sent.
    pub fn submit_commutes(&mut self) -> Result<CommuteSubmission, RegistrationError> {
        if self.submitting {
            return Err(RegistrationError::WrongStep);
        }
        let RegistrationStep::Commutes { profile, commutes } = &self.step else {
            return Err(RegistrationError::WrongStep);
        };
        let commute = commutes.last().cloned().ok_or(RegistrationError::NoCommutes)?;
        let endpoint = Endpoint::AddCommute {
            email: profile.email.clone(),
        };
        self.submitting = true;
        Ok(CommuteSubmission { endpoint, commute })
    }

    pub fn commutes_accepted(&mut self) {
        self.submitting = false;
        if matches!(self.step, RegistrationStep::Commutes { .. }) {
            info!("registration completed");
            self.step = RegistrationStep::Done;
        }
    }

    pub fn commutes_rejected(&mut self) {
        self.submitting = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn profile() -> ProfileForm {
        ProfileForm {
            first_name: "Ann".into(),
            last_name: "Nowak".into(),
            email: "ann+art@x.pl".into(),
            password: Secret::new("correct horse"),
            home_district: " Jeżyce ".into(),
        }
    }

    fn commute(district: &str) -> CommuteDraft {
        CommuteDraft {
            district: district.into(),
            trips_per_week: 5,
            start_hour: 7,
            end_hour: 17,
            transport_modes: vec![TransportMode::Tram, TransportMode::Tram, TransportMode::Bike],
        }
    }

    fn on_commute_step() -> RegistrationFlow {
        let mut flow = RegistrationFlow::new();
        flow.submit_profile(&profile()).unwrap();
        flow.profile_accepted();
        flow
    }

    #[test]
    fn test_profile_validation() {
        let mut form = profile();
        form.first_name = "  ".into();
        assert_matches!(form.validate(), Err(RegistrationError::Required { .. }));

        let mut form = profile();
        form.email = "ann@".into();
        assert_eq!(form.validate(), Err(RegistrationError::InvalidEmail));

        let mut form = profile();
        form.password = Secret::new("short");
        assert_eq!(form.validate(), Err(RegistrationError::PasswordTooShort { min: 8 }));
    }

    #[test]
    fn test_register_payload_shape() {
        let request = profile().validate().unwrap();
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "firstName": "Ann",
                "lastName": "Nowak",
                "email": "ann+art@x.pl",
                "password": "correct horse",
                "homeDistrict": "Jeżyce"
            })
        );
    }

    #[test]
    fn test_commute_ranges() {
        let mut draft = commute("Wilda");
        draft.trips_per_week = 0;
        assert_matches!(draft.validate(), Err(RegistrationError::TripsOutOfRange { value: 0, .. }));

        let mut draft = commute("Wilda");
        draft.end_hour = 24;
        assert_matches!(draft.validate(), Err(RegistrationError::HourOutOfRange { value: 24, .. }));

        let mut draft = commute("Wilda");
        draft.transport_modes.clear();
        assert_eq!(draft.validate(), Err(RegistrationError::NoTransportMode));

        let commute = commute("Wilda").validate().unwrap();
        assert_eq!(commute.transport_modes, vec![TransportMode::Tram, TransportMode::Bike]);
    }

    #[test]
    fn test_commute_wire_format() {
        let commute = commute("Wilda").validate().unwrap();
        assert_eq!(
            serde_json::to_value(&commute).unwrap(),
            serde_json::json!({
                "district": "Wilda",
                "tripsPerWeek": 5,
                "startHour": 7,
                "endHour": 17,
                "transportModes": ["TRAM", "BIKE"]
            })
        );
    }

    #[test]
    fn test_eighth_commute_is_rejected() {
        let mut flow = on_commute_step();
        for i in 0..MAX_COMMUTES {
            flow.add_commute(&commute(&format!("District {i}"))).unwrap();
        }

        let result = flow.add_commute(&commute("One too many"));

        assert_eq!(result, Err(RegistrationError::LimitReached { max: 7 }));
        assert_eq!(flow.commutes().len(), 7);
        assert!(flow.commutes().iter().all(|c| c.district != "One too many"));
    }

    #[test]
    fn test_remove_commute() {
        let mut flow = on_commute_step();
        flow.add_commute(&commute("Wilda")).unwrap();
        flow.add_commute(&commute("Łazarz")).unwrap();

        assert_eq!(flow.remove_commute(0).unwrap().district, "Wilda");
        assert_eq!(flow.remove_commute(5), Err(RegistrationError::NoSuchCommute { index: 5 }));
        assert_eq!(flow.commutes().len(), 1);
    }

    #[test]
    fn test_submit_sends_last_commute_for_profile_email() {
        let mut flow = on_commute_step();
        assert_eq!(flow.submit_commutes(), Err(RegistrationError::NoCommutes));

        flow.add_commute(&commute("Wilda")).unwrap();
        flow.add_commute(&commute("Łazarz")).unwrap();
        let submission = flow.submit_commutes().unwrap();

        assert_eq!(
            submission.endpoint,
            Endpoint::AddCommute {
                email: "ann+art@x.pl".into()
            }
        );
        assert_eq!(submission.commute.district, "Łazarz");

        flow.commutes_accepted();
        assert_eq!(flow.step(), &RegistrationStep::Done);
    }

    #[test]
    fn test_commutes_require_accepted_profile() {
        let mut flow = RegistrationFlow::new();
        assert_eq!(flow.add_commute(&commute("Wilda")), Err(RegistrationError::WrongStep));

        flow.submit_profile(&profile()).unwrap();
        flow.profile_rejected();
        assert_eq!(flow.step(), &RegistrationStep::Profile);
        assert!(!flow.is_submitting());
    }
}
