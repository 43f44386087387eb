// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Error types for the Leneda client

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LenedaError {
    /// Server answered with a non-2xx status
    #[error("Leneda API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Request never produced a response (DNS, TLS, connection reset, timeout)
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// Response JSON is missing a field or has an unexpected type
    #[error("failed to parse `{field}`: {reason}")]
    Parse { field: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("client configuration error: {0}")]
    Config(String),
}

/// Coarse classification used by callers that only care about where a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    Parse,
    Validation,
}

impl LenedaError {
    pub fn parse(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { .. } | Self::Network(_) => ErrorKind::Transport,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::InvalidInput(_) | Self::Config(_) => ErrorKind::Validation,
        }
    }

    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// HTTP status code, when the server produced one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            Self::Parse { .. } | Self::InvalidInput(_) | Self::Config(_) => None,
        }
    }

    /// Raw response body of a failed request
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            Self::Network(_) | Self::Parse { .. } | Self::InvalidInput(_) | Self::Config(_) => None,
        }
    }

    /// Name of the field that failed to parse
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Parse { field, .. } => Some(field),
            Self::Status { .. } | Self::Network(_) | Self::InvalidInput(_) | Self::Config(_) => None,
        }
    }
}

pub type LenedaResult<T> = std::result::Result<T, LenedaError>;
