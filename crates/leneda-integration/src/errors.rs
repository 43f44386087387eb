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


use leneda_client::LenedaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Leneda API error: {0}")]
    Client(#[from] LenedaError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Config entry '{0}' is already set up")]
    AlreadySetUp(String),
}

pub type IntegrationResult<T> = std::result::Result<T, IntegrationError>;
