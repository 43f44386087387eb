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


use crate::coordinator::CoordinatorData;
use bevy_ecs::prelude::*;
use chrono::{DateTime, Utc};
use leneda_client::ObisCode;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::fmt;

pub const DOMAIN: &str = "leneda";

/// The quantities exposed for every metering point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    ElectricityConsumption,
    ElectricityProduction,
    GasConsumption,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [
        Self::ElectricityConsumption,
        Self::ElectricityProduction,
        Self::GasConsumption,
    ];

    pub const fn key(self) -> &'static str {
        match self {
            Self::ElectricityConsumption => "electricity_consumption",
            Self::ElectricityProduction => "electricity_production",
            Self::GasConsumption => "gas_consumption",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::ElectricityConsumption => "Electricity Consumption",
            Self::ElectricityProduction => "Electricity Production",
            Self::GasConsumption => "Gas Consumption",
        }
    }

    pub const fn device_class(self) -> &'static str {
        match self {
            Self::ElectricityConsumption | Self::ElectricityProduction => "energy",
            Self::GasConsumption => "gas",
        }
    }

    /// Yearly totals only grow until the Jan 1 reset
    pub const fn state_class(self) -> &'static str {
        "total_increasing"
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::ElectricityConsumption | Self::ElectricityProduction => "kWh",
            Self::GasConsumption => "m³",
        }
    }

    pub const fn icon(self) -> &'static str {
        match self {
            Self::ElectricityConsumption => "mdi:lightning-bolt",
            Self::ElectricityProduction => "mdi:solar-power",
            Self::GasConsumption => "mdi:fire",
        }
    }

    pub const fn obis_code(self) -> ObisCode {
        match self {
            Self::ElectricityConsumption => ObisCode::ElectricityConsumptionActive,
            Self::ElectricityProduction => ObisCode::ElectricityProductionActive,
            Self::GasConsumption => ObisCode::GasConsumptionVolume,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Physical meter a sensor belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// `(domain, id)`
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub sw_version: String,
}

/// Component: one quantity of one metering point
#[derive(Component, Debug, Clone, PartialEq)]
pub struct LenedaSensor {
    pub entry_id: String,
    pub energy_id: String,
    pub metering_point: String,
    pub kind: SensorKind,
    /// Year the totals are counted for
    pub year: i32,
}

impl LenedaSensor {
    pub fn new(
        entry_id: impl Into<String>,
        energy_id: impl Into<String>,
        metering_point: impl Into<String>,
        kind: SensorKind,
        year: i32,
    ) -> Self {
        Self {
            entry_id: entry_id.into(),
            energy_id: energy_id.into(),
            metering_point: metering_point.into(),
            kind,
            year,
        }
    }

    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.metering_point, self.kind.key())
    }

    pub fn name(&self) -> String {
        format!("{} {}", self.kind.display_name(), self.metering_point)
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifiers: (
                DOMAIN.to_string(),
                format!("{}_{}", self.energy_id, self.metering_point),
            ),
            name: format!("{} / {}", self.energy_id, self.metering_point),
            manufacturer: "Leneda".to_string(),
            model: "Energy Meter".to_string(),
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn extra_attributes(&self) -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            ("metering_point", json!(self.metering_point)),
            ("energy_id", json!(self.energy_id)),
            ("sensor_type", json!(self.kind.key())),
            ("obis_code", json!(self.kind.obis_code().as_str())),
            ("year", json!(self.year)),
        ])
    }

    pub fn native_value(&self, data: &CoordinatorData) -> Option<f64> {
        data.value(&self.metering_point, self.kind)
    }

    /// Available iff this sensor's own quantity has a value
    pub fn available(&self, data: &CoordinatorData) -> bool {
        self.native_value(data).is_some()
    }
}

/// Component: last published state of a sensor
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct SensorState {
    pub value: Option<f64>,
    pub available: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl SensorState {
    /// Returns true when value or availability changed
    pub fn update(&mut self, sensor: &LenedaSensor, data: &CoordinatorData) -> bool {
        let value = sensor.native_value(data);
        let available = sensor.available(data);
        self.last_updated = Some(data.refreshed_at);

        if self.value == value && self.available == available {
            return false;
        }
        self.value = value;
        self.available = available;
        true
    }
}
