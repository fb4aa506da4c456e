use std::str::FromStr;

use crate::error::{AppError, Result};

/// A form is a typed record whose fields are named by an enum; edits keyed by
/// an unknown name are rejected instead of silently creating a new key.
pub trait Form {
    type Field: FromStr<Err = AppError>;

    fn update(&mut self, field: Self::Field, value: String);

    fn set(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        let field = key.parse::<Self::Field>()?;
        self.update(field, value.into());
        Ok(())
    }
}

pub(crate) fn unknown_field(form: &str, key: &str) -> AppError {
    AppError::BadRequest(format!("Unknown {} field: {}", form, key))
}
