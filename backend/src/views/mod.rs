//! Framework-agnostic view models for the marketplace pages.
//!
//! Each view owns its own state and issues at most one request to the
//! platform per user action. Failures never escape a view: they are turned
//! into advisories on a [`Notifier`] and the view stays usable.

use std::fmt;
use std::sync::Mutex;

use serde::{Serialize, Serializer};

pub mod category;
pub mod form;
pub mod profile;
pub mod sign_in;
pub mod sign_up;

pub use category::CategoryView;
pub use profile::ProfileView;
pub use sign_in::SignInView;
pub use sign_up::SignUpView;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    SignIn,
    SignUp,
    Profile,
    ForgotPassword,
    CreateListing,
    Category(String),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Home => write!(f, "/"),
            Route::SignIn => write!(f, "/sign-in"),
            Route::SignUp => write!(f, "/sign-up"),
            Route::Profile => write!(f, "/profile"),
            Route::ForgotPassword => write!(f, "/forgot-password"),
            Route::CreateListing => write!(f, "/create-listing"),
            Route::Category(name) => write!(f, "/category/{}", name),
        }
    }
}

impl Serialize for Route {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Fire-and-forget advisories shown to the user.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    fn error(&self, message: &str) {
        self.notify(Notice {
            level: NoticeLevel::Error,
            message: message.to_string(),
        });
    }
}

/// Collects advisories so they can be returned with a response.
#[derive(Default)]
pub struct Notices {
    notices: Mutex<Vec<Notice>>,
}

impl Notices {
    pub fn take(&self) -> Vec<Notice> {
        match self.notices.lock() {
            Ok(mut notices) => std::mem::take(&mut *notices),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn has_errors(&self) -> bool {
        match self.notices.lock() {
            Ok(notices) => notices.iter().any(|n| n.level == NoticeLevel::Error),
            Err(poisoned) => poisoned
                .into_inner()
                .iter()
                .any(|n| n.level == NoticeLevel::Error),
        }
    }
}

impl Notifier for Notices {
    fn notify(&self, notice: Notice) {
        match self.notices.lock() {
            Ok(mut notices) => notices.push(notice),
            Err(poisoned) => poisoned.into_inner().push(notice),
        }
    }
}
