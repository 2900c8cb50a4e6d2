//! Error types and handling for `TripPlanner`

use thiserror::Error;

/// Main error type for the `TripPlanner` application
#[derive(Error, Debug)]
pub enum TripPlannerError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Third-party API communication errors (places, routing, AI)
    #[error("API error: {message}")]
    Api { message: String },

    /// Backend (PostgREST) request failures
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// Form validation errors, one message per offending field
    #[error("Invalid input: {message}")]
    Validation {
        message: String,
        fields: Vec<(String, String)>,
    },

    /// A record that was looked up by id does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// General application errors
    #[error("Application error: {message}")]
    General { message: String },
}

impl TripPlannerError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    /// Create a new backend error carrying the HTTP status
    pub fn backend<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Create a new validation error without field details
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn not_found<S: Into<String>>(entity: &'static str, id: S) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// Create a new general error
    pub fn general<S: Into<String>>(message: S) -> Self {
        Self::General {
            message: message.into(),
        }
    }

    /// Field level messages of a validation error, empty for other variants
    #[must_use]
    pub fn field_errors(&self) -> &[(String, String)] {
        match self {
            TripPlannerError::Validation { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Get a user-friendly error message, suitable for a toast
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            TripPlannerError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            TripPlannerError::Api { .. } => {
                "Unable to reach an external service. Please try again later.".to_string()
            }
            TripPlannerError::Backend { status, .. } if *status == 401 || *status == 403 => {
                "Your session has expired. Please sign in again.".to_string()
            }
            TripPlannerError::Backend { .. } => {
                "Could not save or load your trip. Please check your internet connection."
                    .to_string()
            }
            TripPlannerError::Validation { message, .. } => {
                format!("Invalid input: {message}")
            }
            TripPlannerError::NotFound { entity, .. } => format!("{entity} no longer exists."),
            TripPlannerError::Cache { .. } => {
                "Cache operation failed. You may need to clear your cache.".to_string()
            }
            TripPlannerError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
            TripPlannerError::General { message } => message.clone(),
        }
    }
}

impl From<validator::ValidationErrors> for TripPlannerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<(String, String)> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| {
                    let message = err
                        .message
                        .as_ref()
                        .map_or_else(|| err.code.to_string(), ToString::to_string);
                    (field.to_string(), message)
                })
            })
            .collect();
        fields.sort();

        let message = fields
            .iter()
            .map(|(_, message)| message.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        Self::Validation { message, fields }
    }
}

impl From<anyhow::Error> for TripPlannerError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<TripPlannerError>() {
            Ok(inner) => inner,
            Err(err) => TripPlannerError::general(format!("{err:#}")),
        }
    }
}
