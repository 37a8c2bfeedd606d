use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::Responder;
use rocket::http::uri::Reference;
use rocket::response::{Flash, Redirect};
use validator::ValidationErrors;

use crate::error::AppError;

/// Only zero-padded ISO calendar dates are accepted; "2024-2-5" is rejected.
static ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("ISO date pattern is valid"));

pub const DATE_REQUIRED: &str = "Date is required!";
pub const DATE_INVALID: &str = "Invalid date format! Use YYYY-MM-DD.";

pub fn parse_date(value: &str) -> Result<NaiveDate, AppError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(AppError::Validation(DATE_REQUIRED.to_string()));
    }

    if !ISO_DATE.is_match(value) {
        return Err(AppError::Validation(DATE_INVALID.to_string()));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::Validation(DATE_INVALID.to_string()))
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|(a, _), (b, _)| a.cmp(b));

        let messages: Vec<String> = fields
            .into_iter()
            .flat_map(|(field, field_errors)| {
                field_errors.iter().map(move |error| {
                    error
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| format!("Invalid value for {}.", field))
                })
            })
            .collect();

        AppError::Validation(messages.join(" "))
    }
}

/// What a form handler yields when it cannot complete: either the user is sent
/// back to the form with a message, or the error falls through to a catcher.
#[derive(Responder)]
pub enum FormError {
    Flash(Flash<Redirect>),
    App(AppError),
}

impl From<AppError> for FormError {
    fn from(error: AppError) -> Self {
        FormError::App(error)
    }
}

impl AppError {
    /// Validation and credential failures are shown on `back_to`; anything else
    /// keeps its status.
    pub fn into_flash<U: TryInto<Reference<'static>>>(self, back_to: U) -> FormError {
        match self {
            AppError::Validation(message) | AppError::Authentication(message) => {
                tracing::warn!(message = %message, "Form rejected");
                FormError::Flash(Flash::error(Redirect::found(back_to), message))
            }
            other => FormError::App(other),
        }
    }
}

pub trait FlashOnInvalid<T> {
    fn flash_on_invalid<U: TryInto<Reference<'static>>>(self, back_to: U) -> Result<T, FormError>;
}

impl<T> FlashOnInvalid<T> for Result<T, AppError> {
    fn flash_on_invalid<U: TryInto<Reference<'static>>>(self, back_to: U) -> Result<T, FormError> {
        self.map_err(|err| err.into_flash(back_to))
    }
}

impl<T> FlashOnInvalid<T> for Result<T, ValidationErrors> {
    fn flash_on_invalid<U: TryInto<Reference<'static>>>(self, back_to: U) -> Result<T, FormError> {
        self.map_err(|errors| AppError::from(errors).into_flash(back_to))
    }
}
