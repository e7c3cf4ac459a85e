use once_cell::sync::Lazy;
use regex::Regex;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::instrument;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;
use crate::hierarchy::MainContractorKind;
use crate::linker::requires_company;
use crate::resolver::{RoleSection, SectionState};

/// Local mobile numbers: `0` or `+27`, then 6, 7 or 8, then eight digits.
pub static MOBILE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|\+27)[678][0-9]{8}$").expect("valid mobile number pattern"));

/// Field name to messages, always ordered by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    /// Folds `other` in with every field prefixed, e.g. `people[1].email`.
    pub fn merge_prefixed(&mut self, prefix: &str, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0
                .entry(format!("{}.{}", prefix, field))
                .or_default()
                .extend(messages);
        }
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationFailed(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join("; ")))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut field_errors = FieldErrors::new();

        for (field, field_errors_for) in errors.field_errors() {
            for error in field_errors_for.iter() {
                field_errors.add(field.to_string(), message_for(error));
            }
        }

        field_errors
    }
}

fn message_for(error: &ValidationError) -> String {
    error
        .message
        .clone()
        .unwrap_or_else(|| "Invalid value".into())
        .to_string()
}

/// Checks one role-section of the staffing form before anything is written.
/// Creating sections have their person fields checked; every section must
/// carry disciplines when its role needs them and a company when the tree
/// requires one.
pub fn validate_section(section: &RoleSection, kind: &MainContractorKind) -> FieldErrors {
    let mut errors = FieldErrors::new();
    let role = section.role();

    match section.state() {
        SectionState::Linking { .. } => {
            errors.add("person", "Select an existing person or create a new one");
            return errors;
        }
        SectionState::Creating { draft, .. } => {
            if let Err(e) = draft.validate() {
                errors = FieldErrors::from(e);
            }
        }
        SectionState::Confirming { .. } => {}
    }

    let attributes = section.attributes();

    if section.schema().disciplines_required && attributes.discipline_ids.is_empty() {
        errors.add("disciplines", "Select at least one discipline");
    }

    if requires_company(role, kind) && attributes.assigned_company_id.is_none() {
        errors.add("assigned_company_id", "Select the company this person works for");
    }

    errors
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationResponse {
    pub fn new(errors: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>>;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        self.log_and_record("API Validation Error");
        let status = self.status_code();

        let (field, message) = match self {
            AppError::ValidationFailed(errors) => {
                return Custom(status, Json(ValidationResponse::new(errors.0)));
            }
            AppError::Database(db_err) => ("storage", format!("Storage error: {}", db_err)),
            AppError::MalformedHierarchy(msg) => ("hierarchy", msg),
            AppError::NoCompanySelected(role) => (
                "assigned_company_id",
                format!("A company must be selected for {}", role),
            ),
            err @ AppError::AssignmentNotFound { .. } => ("assigned_company_id", err.to_string()),
            AppError::Validation(msg) => ("request", msg),
            AppError::NotFound(msg) => ("resource", format!("Not found: {}", msg)),
            AppError::Internal(_) => ("server", "Internal server error".to_string()),
        };

        Custom(status, Json(ValidationResponse::with_error(field, &message)))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        let (field, message) = match self.code {
            404 => ("resource", "Resource not found"),
            409 => ("resource", "Resource already exists"),
            400 => ("request", "Bad request"),
            422 => ("validation", "Validation failed"),
            500 => ("server", "Internal server error"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

pub trait AppErrorExt<T> {
    fn validate_custom(self) -> Result<T, Custom<Json<ValidationResponse>>>;
}

impl<T> AppErrorExt<T> for Result<T, AppError> {
    fn validate_custom(self) -> Result<T, Custom<Json<ValidationResponse>>> {
        self.map_err(|e| e.to_validation_response())
    }
}

pub trait JsonValidateExt<T> {
    fn validate_custom(self) -> Result<T, Custom<Json<ValidationResponse>>>;
}

impl<T: Validate> JsonValidateExt<T> for Json<T> {
    fn validate_custom(self) -> Result<T, Custom<Json<ValidationResponse>>> {
        let inner = self.into_inner();
        match inner.validate() {
            Ok(()) => Ok(inner),
            Err(errors) => Err(AppError::from(errors).to_validation_response()),
        }
    }
}
