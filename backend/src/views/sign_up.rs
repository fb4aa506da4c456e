use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::form::{unknown_field, Form};
use super::{Notifier, Route};
use crate::error::{AppError, Result};
use crate::models::{NewUser, Session};
use crate::platform::Platform;

const SIGN_UP_FAILED: &str = "Something went wrong with registration!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignUpField {
    Name,
    Email,
    Password,
}

impl FromStr for SignUpField {
    type Err = AppError;

    fn from_str(key: &str) -> Result<Self> {
        match key {
            "name" => Ok(SignUpField::Name),
            "email" => Ok(SignUpField::Email),
            "password" => Ok(SignUpField::Password),
            _ => Err(unknown_field("sign-up", key)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignUpForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl Form for SignUpForm {
    type Field = SignUpField;

    fn update(&mut self, field: SignUpField, value: String) {
        match field {
            SignUpField::Name => self.name = value,
            SignUpField::Email => self.email = value,
            SignUpField::Password => self.password = value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignUpPage {
    pub name: String,
    pub email: String,
    pub password_input: &'static str,
    pub sign_in: Route,
}

#[derive(Default)]
pub struct SignUpView {
    form: SignUpForm,
    show_password: bool,
    redirect: Option<Route>,
}

impl SignUpView {
    pub fn with_form(form: SignUpForm) -> Self {
        Self {
            form,
            ..Self::default()
        }
    }

    pub fn on_change(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        self.form.set(key, value)
    }

    pub fn toggle_password_visibility(&mut self) {
        self.show_password = !self.show_password;
    }

    pub fn redirect(&self) -> Option<&Route> {
        self.redirect.as_ref()
    }

    pub async fn submit(&mut self, platform: &Platform, notifier: &dyn Notifier) -> Option<Session> {
        match self.register(platform).await {
            Ok(session) => {
                log::info!("Registered {}", session.uid);
                self.redirect = Some(Route::Home);
                Some(session)
            }
            Err(e) => {
                log::error!("Sign-up failed for {}: {}", self.form.email, e);
                notifier.error(SIGN_UP_FAILED);
                None
            }
        }
    }

    /// Account, then display name, then the user document. Steps are not
    /// rolled back if a later one fails.
    async fn register(&self, platform: &Platform) -> Result<Session> {
        let mut session = platform
            .identity
            .create_account(&self.form.email, &self.form.password)
            .await?;

        platform
            .identity
            .update_display_name(&session, &self.form.name)
            .await?;
        session.display_name = Some(self.form.name.clone());

        let user = NewUser {
            name: self.form.name.clone(),
            email: session.email.clone(),
        };
        platform.users.create(&session.uid, user).await?;
        Ok(session)
    }

    pub fn render(&self) -> SignUpPage {
        SignUpPage {
            name: self.form.name.clone(),
            email: self.form.email.clone(),
            password_input: if self.show_password { "text" } else { "password" },
            sign_in: Route::SignIn,
        }
    }
}
