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

//! OBIS measurement codes understood by the Leneda platform
//!
//! The set is closed: every code the API accepts has a variant here, and the
//! wire token is the only string form that round-trips.

use crate::errors::{LenedaError, LenedaResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Physical quantity and direction a code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObisFamily {
    ElectricityConsumption,
    ElectricityProduction,
    GasConsumption,
}

impl ObisFamily {
    pub fn codes(self) -> impl Iterator<Item = ObisCode> {
        ObisCode::ALL.into_iter().filter(move |c| c.family() == self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObisCode {
    ElectricityConsumptionActive,
    ElectricityConsumptionReactive,
    /// Consumption covered by production sharing, layer 1 (AIR)
    ElectricityConsumptionCoveredLayer1,
    /// Layer 2 (ACR/ACF/AC1)
    ElectricityConsumptionCoveredLayer2,
    /// Layer 3 (CEL)
    ElectricityConsumptionCoveredLayer3,
    /// Layer 4 (APS/CER/CEN)
    ElectricityConsumptionCoveredLayer4,
    /// Consumption left after all sharing layers
    ElectricityConsumptionRemaining,

    ElectricityProductionActive,
    ElectricityProductionReactive,
    ElectricityProductionSharedLayer1,
    ElectricityProductionSharedLayer2,
    ElectricityProductionSharedLayer3,
    ElectricityProductionSharedLayer4,
    ElectricityProductionRemaining,

    GasConsumptionVolume,
    GasConsumptionStandardVolume,
    GasConsumptionEnergy,
}

impl ObisCode {
    pub const ALL: [ObisCode; 17] = [
        ObisCode::ElectricityConsumptionActive,
        ObisCode::ElectricityConsumptionReactive,
        ObisCode::ElectricityConsumptionCoveredLayer1,
        ObisCode::ElectricityConsumptionCoveredLayer2,
        ObisCode::ElectricityConsumptionCoveredLayer3,
        ObisCode::ElectricityConsumptionCoveredLayer4,
        ObisCode::ElectricityConsumptionRemaining,
        ObisCode::ElectricityProductionActive,
        ObisCode::ElectricityProductionReactive,
        ObisCode::ElectricityProductionSharedLayer1,
        ObisCode::ElectricityProductionSharedLayer2,
        ObisCode::ElectricityProductionSharedLayer3,
        ObisCode::ElectricityProductionSharedLayer4,
        ObisCode::ElectricityProductionRemaining,
        ObisCode::GasConsumptionVolume,
        ObisCode::GasConsumptionStandardVolume,
        ObisCode::GasConsumptionEnergy,
    ];

    /// Wire token sent as `obisCode`
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ElectricityConsumptionActive => "1-1:1.29.0",
            Self::ElectricityConsumptionReactive => "1-1:3.29.0",
            Self::ElectricityConsumptionCoveredLayer1 => "1-65:1.29.1",
            Self::ElectricityConsumptionCoveredLayer2 => "1-65:1.29.3",
            Self::ElectricityConsumptionCoveredLayer3 => "1-65:1.29.2",
            Self::ElectricityConsumptionCoveredLayer4 => "1-65:1.29.4",
            Self::ElectricityConsumptionRemaining => "1-65:1.29.9",
            Self::ElectricityProductionActive => "1-1:2.29.0",
            Self::ElectricityProductionReactive => "1-1:4.29.0",
            Self::ElectricityProductionSharedLayer1 => "1-65:2.29.1",
            Self::ElectricityProductionSharedLayer2 => "1-65:2.29.3",
            Self::ElectricityProductionSharedLayer3 => "1-65:2.29.2",
            Self::ElectricityProductionSharedLayer4 => "1-65:2.29.4",
            Self::ElectricityProductionRemaining => "1-65:2.29.9",
            Self::GasConsumptionVolume => "7-1:99.23.15",
            Self::GasConsumptionStandardVolume => "7-1:99.23.17",
            Self::GasConsumptionEnergy => "7-20:99.33.17",
        }
    }

    pub const fn family(self) -> ObisFamily {
        match self {
            Self::ElectricityConsumptionActive
            | Self::ElectricityConsumptionReactive
            | Self::ElectricityConsumptionCoveredLayer1
            | Self::ElectricityConsumptionCoveredLayer2
            | Self::ElectricityConsumptionCoveredLayer3
            | Self::ElectricityConsumptionCoveredLayer4
            | Self::ElectricityConsumptionRemaining => ObisFamily::ElectricityConsumption,
            Self::ElectricityProductionActive
            | Self::ElectricityProductionReactive
            | Self::ElectricityProductionSharedLayer1
            | Self::ElectricityProductionSharedLayer2
            | Self::ElectricityProductionSharedLayer3
            | Self::ElectricityProductionSharedLayer4
            | Self::ElectricityProductionRemaining => ObisFamily::ElectricityProduction,
            Self::GasConsumptionVolume
            | Self::GasConsumptionStandardVolume
            | Self::GasConsumptionEnergy => ObisFamily::GasConsumption,
        }
    }

    /// Unit of the raw 15-minute samples for this code
    pub const fn unit(self) -> &'static str {
        match self {
            Self::ElectricityConsumptionReactive | Self::ElectricityProductionReactive => "kVAR",
            Self::GasConsumptionVolume => "m³",
            Self::GasConsumptionStandardVolume => "Nm³",
            Self::GasConsumptionEnergy => "kWh",
            Self::ElectricityConsumptionActive
            | Self::ElectricityConsumptionCoveredLayer1
            | Self::ElectricityConsumptionCoveredLayer2
            | Self::ElectricityConsumptionCoveredLayer3
            | Self::ElectricityConsumptionCoveredLayer4
            | Self::ElectricityConsumptionRemaining
            | Self::ElectricityProductionActive
            | Self::ElectricityProductionSharedLayer1
            | Self::ElectricityProductionSharedLayer2
            | Self::ElectricityProductionSharedLayer3
            | Self::ElectricityProductionSharedLayer4
            | Self::ElectricityProductionRemaining => "kW",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::ElectricityConsumptionActive => "Measured active consumption",
            Self::ElectricityConsumptionReactive => "Measured reactive consumption",
            Self::ElectricityConsumptionCoveredLayer1 => {
                "Consumption covered by production sharing group, layer 1"
            }
            Self::ElectricityConsumptionCoveredLayer2 => {
                "Consumption covered by production sharing group, layer 2"
            }
            Self::ElectricityConsumptionCoveredLayer3 => {
                "Consumption covered by production sharing group, layer 3"
            }
            Self::ElectricityConsumptionCoveredLayer4 => {
                "Consumption covered by production sharing group, layer 4"
            }
            Self::ElectricityConsumptionRemaining => "Remaining consumption after sharing",
            Self::ElectricityProductionActive => "Measured active production",
            Self::ElectricityProductionReactive => "Measured reactive production",
            Self::ElectricityProductionSharedLayer1 => "Production shared with group, layer 1",
            Self::ElectricityProductionSharedLayer2 => "Production shared with group, layer 2",
            Self::ElectricityProductionSharedLayer3 => "Production shared with group, layer 3",
            Self::ElectricityProductionSharedLayer4 => "Production shared with group, layer 4",
            Self::ElectricityProductionRemaining => "Remaining production after sharing",
            Self::GasConsumptionVolume => "Measured consumed volume",
            Self::GasConsumptionStandardVolume => "Measured consumed standard volume",
            Self::GasConsumptionEnergy => "Measured consumed energy",
        }
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObisCode {
    type Err = LenedaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        ObisCode::ALL
            .into_iter()
            .find(|code| code.as_str() == token)
            .ok_or_else(|| LenedaError::InvalidInput(format!("unknown OBIS code '{s}'")))
    }
}

impl AsRef<str> for ObisCode {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<ObisCode> for String {
    fn from(code: ObisCode) -> Self {
        code.as_str().to_string()
    }
}

impl PartialEq<str> for ObisCode {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for ObisCode {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl PartialEq<String> for ObisCode {
    fn eq(&self, other: &String) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<ObisCode> for str {
    fn eq(&self, other: &ObisCode) -> bool {
        self == other.as_str()
    }
}

impl PartialEq<ObisCode> for &str {
    fn eq(&self, other: &ObisCode) -> bool {
        *self == other.as_str()
    }
}

impl PartialEq<ObisCode> for String {
    fn eq(&self, other: &ObisCode) -> bool {
        self == other.as_str()
    }
}

impl Serialize for ObisCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ObisCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Anything a client operation accepts where an OBIS code is expected
///
/// Modeled after `reqwest::IntoUrl`: the enum passes through, strings go
/// through the registry and fail for unknown tokens.
pub trait IntoObisCode {
    fn into_obis_code(self) -> LenedaResult<ObisCode>;
}

impl IntoObisCode for ObisCode {
    fn into_obis_code(self) -> LenedaResult<ObisCode> {
        Ok(self)
    }
}

impl IntoObisCode for &ObisCode {
    fn into_obis_code(self) -> LenedaResult<ObisCode> {
        Ok(*self)
    }
}

impl IntoObisCode for &str {
    fn into_obis_code(self) -> LenedaResult<ObisCode> {
        self.parse()
    }
}

impl IntoObisCode for String {
    fn into_obis_code(self) -> LenedaResult<ObisCode> {
        self.parse()
    }
}

impl IntoObisCode for &String {
    fn into_obis_code(self) -> LenedaResult<ObisCode> {
        self.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_wire_tokens_are_unique_and_parse_back() {
        let tokens: HashSet<&str> = ObisCode::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(tokens.len(), ObisCode::ALL.len());

        for code in ObisCode::ALL {
            assert_eq!(code.as_str().parse::<ObisCode>().unwrap(), code);
        }
    }

    #[test]
    fn test_equality_against_raw_strings() {
        let code = ObisCode::ElectricityConsumptionActive;
        assert_eq!(code, "1-1:1.29.0");
        assert_eq!("1-1:1.29.0", code);
        assert_eq!(code, "1-1:1.29.0".to_string());
        assert_ne!(code, "1-1:2.29.0");
    }

    #[test]
    fn test_unknown_code_is_rejected() {
        let err = "9-9:9.9.9".parse::<ObisCode>().unwrap_err();
        assert!(matches!(err, LenedaError::InvalidInput(_)));
    }

    #[test]
    fn test_families() {
        assert_eq!(
            ObisCode::GasConsumptionVolume.family(),
            ObisFamily::GasConsumption
        );
        assert_eq!(ObisFamily::ElectricityConsumption.codes().count(), 7);
        assert_eq!(ObisFamily::ElectricityProduction.codes().count(), 7);
        assert_eq!(ObisFamily::GasConsumption.codes().count(), 3);
        assert!(
            ObisFamily::ElectricityProduction
                .codes()
                .all(|c| c.as_str().contains(":2.") || c.as_str().contains(":4."))
        );
    }

    #[test]
    fn test_serde_uses_wire_token() {
        let json = serde_json::to_string(&ObisCode::GasConsumptionVolume).unwrap();
        assert_eq!(json, "\"7-1:99.23.15\"");

        let code: ObisCode = serde_json::from_str("\"1-65:2.29.9\"").unwrap();
        assert_eq!(code, ObisCode::ElectricityProductionRemaining);

        assert!(serde_json::from_str::<ObisCode>("\"bogus\"").is_err());
    }

    #[test]
    fn test_into_obis_code_accepts_both_forms() {
        assert_eq!(
            "1-1:2.29.0".into_obis_code().unwrap(),
            ObisCode::ElectricityProductionActive
        );
        assert_eq!(
            ObisCode::GasConsumptionEnergy.into_obis_code().unwrap(),
            ObisCode::GasConsumptionEnergy
        );
        assert!(String::from("nope").into_obis_code().is_err());
    }
}
