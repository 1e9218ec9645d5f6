use regex::Regex;
use std::path::Path;
use crate::errors::{AppError, AppResult};

/// Largest screenshot the upload endpoint accepts.
pub const MAX_UPLOAD_SIZE: u64 = 25 * 1024 * 1024;

pub struct InputValidator;

impl InputValidator {
    pub fn validate_email(email: &str) -> AppResult<()> {
        let trimmed = email.trim();

        if trimmed.is_empty() {
            return Err(AppError::validation("email", "Email cannot be empty"));
        }

        if trimmed.len() > 254 {
            return Err(AppError::validation("email", "Email too long (max 254 characters)"));
        }

        let email_pattern = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
        if !email_pattern.is_match(trimmed) {
            return Err(AppError::validation("email", "Email address is not valid"));
        }

        Ok(())
    }

    pub fn validate_password(password: &str) -> AppResult<()> {
        if password.is_empty() {
            return Err(AppError::validation("password", "Password cannot be empty"));
        }

        if password.len() > 4096 {
            return Err(AppError::validation("password", "Password too long"));
        }

        Ok(())
    }

    pub fn validate_file_path(path: &str) -> AppResult<()> {
        if path.trim().is_empty() {
            return Err(AppError::validation("file_path", "File path cannot be empty"));
        }

        let path_obj = Path::new(path);

        if let Some(extension) = path_obj.extension() {
            let ext = extension.to_string_lossy().to_lowercase();
            if ext != "png" {
                return Err(AppError::invalid_file_type(path));
            }
        } else {
            return Err(AppError::validation("file_path", "File must have an extension"));
        }

        if !path_obj.exists() {
            return Err(AppError::file_not_found(path));
        }

        if !path_obj.is_file() {
            return Err(AppError::validation("file_path", "Path is not a file"));
        }

        Ok(())
    }

    /// Replace characters that are not allowed in file or directory names.
    pub fn sanitize_filename(filename: &str) -> String {
        let unsafe_chars = Regex::new(r#"[<>:"/\\|?*\x00-\x1f]"#).unwrap();
        let sanitized = unsafe_chars.replace_all(filename.trim(), "_");

        // Leading dots would hide the folder or climb out of it
        let sanitized = sanitized.trim_start_matches('.');

        if sanitized.chars().count() > 200 {
            sanitized.chars().take(200).collect()
        } else {
            sanitized.to_string()
        }
    }

    pub fn validate_image_file(file_path: &str) -> AppResult<()> {
        Self::validate_file_path(file_path)?;

        let metadata = std::fs::metadata(file_path)?;
        if metadata.len() > MAX_UPLOAD_SIZE {
            return Err(AppError::file_too_large(file_path));
        }

        Ok(())
    }
}
