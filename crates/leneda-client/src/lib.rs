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

//! Client for the Leneda energy data platform REST API
//!
//! Three operations are exposed on [`LenedaClient`]: the raw metering time
//! series, the aggregated time series and metering-data access requests.

pub mod client;
pub mod errors;
pub mod models;
pub mod obis;
pub mod params;
pub mod transport;

pub use client::{LenedaClient, LenedaClientBuilder};
pub use errors::{ErrorKind, LenedaError, LenedaResult};
pub use models::{AggregatedMeteringData, AggregatedMeteringValue, MeteringData, MeteringValue};
pub use obis::{IntoObisCode, ObisCode, ObisFamily};
pub use params::{AccessRequest, AggregationLevel, IntoDate, IntoTimestamp, TransformationMode};
pub use transport::DEFAULT_BASE_URL;
