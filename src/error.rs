use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use thiserror::Error;
use tracing::{Span, error, warn};

use crate::roles::StaffRole;
use crate::validation::FieldErrors;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed hierarchy: {0}")]
    MalformedHierarchy(String),

    #[error("No company selected for {0}")]
    NoCompanySelected(StaffRole),

    #[error("No contractor assignment for contractor {contractor_id} in project {project_id}")]
    AssignmentNotFound { project_id: i64, contractor_id: i64 },

    #[error("Validation failed: {0}")]
    ValidationFailed(FieldErrors),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = match self {
            AppError::Database(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Storage error");
                "storage_error"
            }
            AppError::MalformedHierarchy(msg) => {
                error!(message = %msg, context = %ctx, "Malformed contractor hierarchy");
                "malformed_hierarchy"
            }
            AppError::NoCompanySelected(role) => {
                warn!(role = %role, context = %ctx, "No company selected");
                "no_company_selected"
            }
            AppError::AssignmentNotFound {
                project_id,
                contractor_id,
            } => {
                warn!(project_id, contractor_id, context = %ctx, "Assignment not found");
                "assignment_not_found"
            }
            AppError::ValidationFailed(errors) => {
                warn!(errors = %errors, context = %ctx, "Validation failed");
                "validation_failed"
            }
            AppError::Validation(msg) => {
                warn!(message = %msg, context = %ctx, "Validation error");
                "validation_error"
            }
            AppError::NotFound(msg) => {
                warn!(message = %msg, context = %ctx, "Not found error");
                "not_found_error"
            }
            AppError::Internal(msg) => {
                error!(message = %msg, context = %ctx, "Internal server error");
                "internal_error"
            }
        };

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            match self {
                AppError::Database(_) | AppError::Internal(_) | AppError::MalformedHierarchy(_) => {
                    current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
                }
                _ => {}
            }
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::Database(_) => Status::InternalServerError,
            AppError::MalformedHierarchy(_) => Status::Conflict,
            AppError::NoCompanySelected(_) => Status::UnprocessableEntity,
            AppError::AssignmentNotFound { .. } => Status::NotFound,
            AppError::ValidationFailed(_) => Status::UnprocessableEntity,
            AppError::Validation(_) => Status::BadRequest,
            AppError::NotFound(_) => Status::NotFound,
            AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        self.to_status_with_log(&format!("Request to {} {}", req.method(), req.uri()))
            .respond_to(req)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::ValidationFailed(FieldErrors::from(errors))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.to_status_with_log("Error conversion into Status")
    }
}
