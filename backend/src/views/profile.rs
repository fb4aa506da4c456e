use std::str::FromStr;

use serde::Serialize;

use super::form::{unknown_field, Form};
use super::{Notifier, Route};
use crate::error::{AppError, Result};
use crate::models::Session;
use crate::platform::Platform;

const UPDATE_FAILED: &str = "Could not update profile details! Try again later!";
const NAME_REQUIRED: &str = "Name cannot be empty!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Name,
    Email,
}

impl FromStr for ProfileField {
    type Err = AppError;

    fn from_str(key: &str) -> Result<Self> {
        match key {
            "name" => Ok(ProfileField::Name),
            "email" => Ok(ProfileField::Email),
            _ => Err(unknown_field("profile", key)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
}

impl Form for ProfileForm {
    type Field = ProfileField;

    fn update(&mut self, field: ProfileField, value: String) {
        match field {
            ProfileField::Name => self.name = value,
            ProfileField::Email => self.email = value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub name: String,
    pub email: String,
    pub editing: bool,
    pub action: &'static str,
    pub create_listing: Route,
}

/// The signed-in user's personal details, read-only until edit mode is entered.
pub struct ProfileView {
    session: Session,
    form: ProfileForm,
    editing: bool,
    redirect: Option<Route>,
}

impl ProfileView {
    pub fn new(session: Session) -> Self {
        let form = ProfileForm {
            name: session.display_name.clone().unwrap_or_default(),
            email: session.email.clone(),
        };
        Self {
            session,
            form,
            editing: false,
            redirect: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn form(&self) -> &ProfileForm {
        &self.form
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    pub fn redirect(&self) -> Option<&Route> {
        self.redirect.as_ref()
    }

    /// Inputs are disabled outside edit mode.
    pub fn on_change(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        if !self.editing {
            return Err(AppError::BadRequest(
                "Profile is not being edited".to_string(),
            ));
        }
        self.form.set(key, value)
    }

    /// "Change" enters edit mode; "Done" submits and leaves it.
    pub async fn toggle_edit(&mut self, platform: &Platform, notifier: &dyn Notifier) {
        if self.editing {
            self.submit(platform, notifier).await;
        }
        self.editing = !self.editing;
    }

    /// Pushes a changed name to the identity provider and the user document.
    /// Returns whether anything was written.
    pub async fn submit(&mut self, platform: &Platform, notifier: &dyn Notifier) -> bool {
        if self.form.email != self.session.email {
            log::warn!(
                "Email change for {} is not persisted; only the name is saved",
                self.session.uid
            );
        }

        let name = self.form.name.trim().to_string();
        if self.session.display_name.as_deref().unwrap_or_default() == name {
            return false;
        }
        if let Some(message) = self.validation_error() {
            notifier.error(message);
            return false;
        }

        match self.write_name(platform, &name).await {
            Ok(()) => {
                log::info!("Updated display name for {}", self.session.uid);
                self.session.display_name = Some(name);
                true
            }
            Err(e) => {
                log::warn!("Failed to update profile for {}: {}", self.session.uid, e);
                notifier.error(UPDATE_FAILED);
                false
            }
        }
    }

    /// The advisory a submit of the current form would raise before writing anything.
    pub fn validation_error(&self) -> Option<&'static str> {
        let name = self.form.name.trim();
        let unchanged = self.session.display_name.as_deref().unwrap_or_default() == name;
        (name.is_empty() && !unchanged).then_some(NAME_REQUIRED)
    }

    async fn write_name(&self, platform: &Platform, name: &str) -> Result<()> {
        platform
            .identity
            .update_display_name(&self.session, name)
            .await?;
        platform.users.update_name(&self.session.uid, name).await
    }

    pub async fn logout(&mut self, platform: &Platform) {
        if let Err(e) = platform.identity.sign_out(&self.session).await {
            log::warn!("Sign-out failed for {}: {}", self.session.uid, e);
        }
        self.redirect = Some(Route::Home);
    }

    pub fn render(&self) -> ProfilePage {
        ProfilePage {
            name: self.form.name.clone(),
            email: self.form.email.clone(),
            editing: self.editing,
            action: if self.editing { "Done" } else { "Change" },
            create_listing: Route::CreateListing,
        }
    }
}
