use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid file type: {path}. Only PNG screenshots are supported.")]
    InvalidFileType { path: String },

    #[error("File too large: {path}. Maximum size is 25MB.")]
    FileTooLarge { path: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn file_not_found(path: &str) -> Self {
        Self::FileNotFound {
            path: path.to_string(),
        }
    }

    pub fn invalid_file_type(path: &str) -> Self {
        Self::InvalidFileType {
            path: path.to_string(),
        }
    }

    pub fn file_too_large(path: &str) -> Self {
        Self::FileTooLarge {
            path: path.to_string(),
        }
    }
}

/// Failures talking to the identity provider.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The provider answered with an error payload, e.g. `INVALID_PASSWORD`.
    #[error("Identity provider rejected the request ({code}): {message}")]
    Rejected { code: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed identity response: {0}")]
    InvalidResponse(String),

    /// `refresh()` was called with no refresh token stored.
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Identity provider is not configured: {0}")]
    NotConfigured(String),
}

impl AuthError {
    pub fn rejected(code: u16, message: &str) -> Self {
        Self::Rejected {
            code,
            message: message.to_string(),
        }
    }

    /// Message suitable for a login dialog.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Rejected { message, .. } => message.clone(),
            AuthError::Network(_) => "Could not reach the ScapeCloud login server.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Failures of a single screenshot upload. None of them are retried.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Not logged in to ScapeCloud")]
    Unauthenticated,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upload rejected ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Malformed upload response: {0}")]
    InvalidResponse(String),

    #[error("Could not read screenshot: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn server(status: u16, message: &str) -> Self {
        Self::Server {
            status,
            message: message.to_string(),
        }
    }

    /// Failures decided by the service or the session, as opposed to
    /// transport and local file errors.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            UploadError::Server { .. } | UploadError::Unauthenticated | UploadError::InvalidResponse(_)
        )
    }
}
