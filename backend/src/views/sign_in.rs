use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::form::{unknown_field, Form};
use super::{Notifier, Route};
use crate::error::{AppError, Result};
use crate::models::Session;
use crate::platform::IdentityProvider;

const BAD_CREDENTIALS: &str = "Incorrect user credentials entered!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInField {
    Email,
    Password,
}

impl FromStr for SignInField {
    type Err = AppError;

    fn from_str(key: &str) -> Result<Self> {
        match key {
            "email" => Ok(SignInField::Email),
            "password" => Ok(SignInField::Password),
            _ => Err(unknown_field("sign-in", key)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl Form for SignInForm {
    type Field = SignInField;

    fn update(&mut self, field: SignInField, value: String) {
        match field {
            SignInField::Email => self.email = value,
            SignInField::Password => self.password = value,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SignInPage {
    pub email: String,
    pub password_input: &'static str,
    pub forgot_password: Route,
    pub sign_up: Route,
}

#[derive(Default)]
pub struct SignInView {
    form: SignInForm,
    show_password: bool,
    redirect: Option<Route>,
}

impl SignInView {
    pub fn with_form(form: SignInForm) -> Self {
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

    /// Every failure cause is reported with the same advisory.
    pub async fn submit(
        &mut self,
        identity: &dyn IdentityProvider,
        notifier: &dyn Notifier,
    ) -> Option<Session> {
        match identity.sign_in(&self.form.email, &self.form.password).await {
            Ok(session) => {
                log::info!("Signed in {}", session.uid);
                self.redirect = Some(Route::Home);
                Some(session)
            }
            Err(e) => {
                log::warn!("Sign-in failed for {}: {}", self.form.email, e);
                notifier.error(BAD_CREDENTIALS);
                None
            }
        }
    }

    pub fn render(&self) -> SignInPage {
        SignInPage {
            email: self.form.email.clone(),
            password_input: if self.show_password { "text" } else { "password" },
            forgot_password: Route::ForgotPassword,
            sign_up: Route::SignUp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test_platform;
    use crate::views::Notices;

    #[tokio::test]
    async fn valid_credentials_navigate_home() {
        let platform = test_platform();
        platform
            .identity
            .create_account("jane@example.com", "secret1")
            .await
            .unwrap();
        let notices = Notices::default();

        let mut view = SignInView::default();
        view.on_change("email", "jane@example.com").unwrap();
        view.on_change("password", "secret1").unwrap();
        let session = view.submit(platform.identity.as_ref(), &notices).await;

        assert_eq!(session.unwrap().email, "jane@example.com");
        assert_eq!(view.redirect(), Some(&Route::Home));
        assert!(notices.take().is_empty());
    }

    #[tokio::test]
    async fn invalid_credentials_stay_put_with_advisory() {
        let platform = test_platform();
        platform
            .identity
            .create_account("jane@example.com", "secret1")
            .await
            .unwrap();

        for (email, password) in [("jane@example.com", "nope!!"), ("bob@example.com", "secret1"), ("", "")] {
            let notices = Notices::default();
            let mut view = SignInView::with_form(SignInForm {
                email: email.to_string(),
                password: password.to_string(),
            });
            assert!(view.submit(platform.identity.as_ref(), &notices).await.is_none());
            assert!(view.redirect().is_none());
            assert_eq!(notices.take()[0].message, "Incorrect user credentials entered!");
        }
    }

    #[test]
    fn password_visibility_toggles_input_type() {
        let mut view = SignInView::default();
        assert_eq!(view.render().password_input, "password");
        view.toggle_password_visibility();
        assert_eq!(view.render().password_input, "text");
        assert!(view.on_change("username", "jane").is_err());
    }
}
