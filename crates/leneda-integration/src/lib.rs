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


//! Leneda metering as a host integration: config entries, a setup flow,
//! yearly energy sensors and the ECS plugin that keeps them refreshed.

pub mod config;
pub mod config_flow;
pub mod coordinator;
pub mod entries;
pub mod errors;
pub mod plugin;
pub mod sensor;

pub use config::{AppConfig, EntryConfig};
pub use config_flow::{
    ConfigFlow, CredentialsInput, FlowForm, FlowResult, verify_credentials, verify_entry,
};
pub use coordinator::{Coordinator, CoordinatorData, MeterReadings, MeteringSource};
pub use entries::{EntryHandle, EntryRegistry};
pub use errors::{IntegrationError, IntegrationResult};
pub use plugin::{
    LenedaPlugin, LenedaSettings, RefreshSender, RefreshUpdate, SetupEntry, TokioRuntimeHandle,
    UnloadEntry,
};
pub use sensor::{DeviceInfo, LenedaSensor, SensorKind, SensorState};
