use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::admin::{AppUserUpdate, UserForm};
use crate::api::{CurrentUser, LoginRequest};
use crate::event::Secret;
use crate::registration::is_valid_email;

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthError {
    #[error("enter a valid email address")]
    InvalidEmail,

    #[error("enter your password")]
    MissingPassword,

    #[error("a sign-in is already in progress")]
    LoginInProgress,

    #[error("sign in to continue")]
    NotSignedIn,

    #[error("administrator access is required")]
    NotAdmin,

    #[error("your previous profile change is still being saved")]
    ProfileSaveInProgress,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Session {
    /// `/auth/me` has not answered yet.
    #[default]
    Unknown,
    Anonymous,
    Authenticated(CurrentUser),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthState {
    session: Session,
    login_pending: bool,
    /// Own-profile changes sent but not yet confirmed.
    staged_update: Option<AppUserUpdate>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_login_pending(&self) -> bool {
        self.login_pending
    }

    pub fn current_user(&self) -> Option<&CurrentUser> {
        match &self.session {
            Session::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.current_user().is_some_and(CurrentUser::is_admin)
    }

    pub fn require_user(&self) -> Result<&CurrentUser, AuthError> {
        self.current_user().ok_or(AuthError::NotSignedIn)
    }

    pub fn require_admin(&self) -> Result<&CurrentUser, AuthError> {
        let user = self.require_user()?;
        if !user.is_admin() {
            debug!(roles = ?user.roles, "admin gate refused");
            return Err(AuthError::NotAdmin);
        }
        Ok(user)
    }

    pub fn begin_login(&mut self, email: &str, password: &Secret) -> Result<LoginRequest, AuthError> {
        if self.login_pending {
            return Err(AuthError::LoginInProgress);
        }
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.expose().is_empty() {
            return Err(AuthError::MissingPassword);
        }
        self.login_pending = true;
        Ok(LoginRequest {
            email: email.trim().to_string(),
            password: password.clone(),
        })
    }

    pub fn login_failed(&mut self) {
        self.login_pending = false;
    }

    /// `None` means the server knows no session for us.
    pub fn set_user(&mut self, user: Option<CurrentUser>) {
        self.login_pending = false;
        self.session = match user {
            Some(user) => {
                info!(admin = user.is_admin(), "session established");
                Session::Authenticated(user)
            }
            None => Session::Anonymous,
        };
    }

    pub fn sign_out(&mut self) {
        self.login_pending = false;
        self.staged_update = None;
        self.session = Session::Anonymous;
    }

    /// Own-profile edits use the admin diff rules but can never touch roles
    /// or the enabled flag.
    pub fn profile_update(&self, form: &UserForm) -> Result<AppUserUpdate, AuthError> {
        let user = self.require_user()?;
        if self.is_profile_saving() {
            return Err(AuthError::ProfileSaveInProgress);
        }
        let seed = profile_seed(user);
        let mut update = form.diff(&seed);
        update.roles = None;
        update.enabled = None;
        Ok(update)
    }

    pub fn is_profile_saving(&self) -> bool {
        self.staged_update.is_some()
    }

    pub fn stage_profile_update(&mut self, update: AppUserUpdate) {
        self.staged_update = Some(update);
    }

    pub fn discard_profile_update(&mut self) {
        self.staged_update = None;
    }

    /// Applies the staged changes to the session user once the server accepted them.
    pub fn commit_profile_update(&mut self) {
        let Some(update) = self.staged_update.take() else {
            return;
        };
        let Session::Authenticated(user) = &mut self.session else {
            return;
        };
        if let Some(first_name) = update.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name;
        }
        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(home_district) = update.home_district {
            user.home_district = Some(home_district);
        }
    }
}

pub fn profile_seed(user: &CurrentUser) -> UserForm {
    UserForm {
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        email: user.email.clone(),
        home_district: user.home_district.clone().unwrap_or_default(),
        roles: user.roles.clone(),
        enabled: None,
    }
}
