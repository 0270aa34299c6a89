// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Brook Contributors

//! Error types for Brook
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;

/// Main error type for Brook operations
#[derive(Error, Debug)]
pub enum BrookError {
    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Attachment validation errors, one entry per rejected item
    #[error("Invalid image attachments: {}", .0.join(", "))]
    InvalidAttachments(Vec<String>),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Gateway lifecycle errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed (invalid API key)
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// Streaming error
    #[error("Streaming error: {0}")]
    StreamError(String),
}

impl BrookError {
    /// Message that is safe to show to an end user.
    ///
    /// Validation and input errors are self-descriptive and pass through
    /// verbatim. Provider and internal failures are replaced by a generic
    /// message unless `include_detail` is set (development environments).
    pub fn user_message(&self, include_detail: bool) -> String {
        match self {
            BrookError::InvalidAttachments(_) | BrookError::InvalidInput(_) => self.to_string(),
            _ if include_detail => self.to_string(),
            _ => "The assistant is temporarily unavailable. Please try again later.".to_string(),
        }
    }
}

/// Result type alias for Brook operations
pub type Result<T> = std::result::Result<T, BrookError>;
