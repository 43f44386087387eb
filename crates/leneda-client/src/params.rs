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

//! Request parameters and their wire formatting

use crate::errors::{LenedaError, LenedaResult};
use crate::obis::ObisCode;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bucket size of an aggregated series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationLevel {
    Hour,
    Day,
    Week,
    Month,
    Year,
    /// One bucket spanning the whole requested range
    Infinite,
}

impl AggregationLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "Hour",
            Self::Day => "Day",
            Self::Week => "Week",
            Self::Month => "Month",
            Self::Year => "Year",
            Self::Infinite => "Infinite",
        }
    }
}

impl fmt::Display for AggregationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationLevel {
    type Err = LenedaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "infinite" => Ok(Self::Infinite),
            _ => Err(LenedaError::InvalidInput(format!(
                "unknown aggregation level '{s}'"
            ))),
        }
    }
}

/// How raw samples are folded into one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransformationMode {
    Accumulation,
    Latest,
    Difference,
}

impl TransformationMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accumulation => "Accumulation",
            Self::Latest => "Latest",
            Self::Difference => "Difference",
        }
    }
}

impl fmt::Display for TransformationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformationMode {
    type Err = LenedaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accumulation" => Ok(Self::Accumulation),
            "latest" => Ok(Self::Latest),
            "difference" => Ok(Self::Difference),
            _ => Err(LenedaError::InvalidInput(format!(
                "unknown transformation mode '{s}'"
            ))),
        }
    }
}

/// Timestamps accepted by the raw time-series fetch
///
/// Every form is normalized to a UTC instant and sent as `YYYY-MM-DDTHH:MM:SSZ`.
pub trait IntoTimestamp {
    fn into_timestamp(self) -> LenedaResult<DateTime<Utc>>;
}

impl<Tz: TimeZone> IntoTimestamp for DateTime<Tz> {
    fn into_timestamp(self) -> LenedaResult<DateTime<Utc>> {
        Ok(self.with_timezone(&Utc))
    }
}

/// Naive values carry no zone and are taken as UTC
impl IntoTimestamp for NaiveDateTime {
    fn into_timestamp(self) -> LenedaResult<DateTime<Utc>> {
        Ok(self.and_utc())
    }
}

impl IntoTimestamp for &str {
    fn into_timestamp(self) -> LenedaResult<DateTime<Utc>> {
        let raw = self.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| LenedaError::InvalidInput(format!("'{self}' is not an ISO-8601 timestamp")))
    }
}

impl IntoTimestamp for String {
    fn into_timestamp(self) -> LenedaResult<DateTime<Utc>> {
        self.as_str().into_timestamp()
    }
}

impl IntoTimestamp for &String {
    fn into_timestamp(self) -> LenedaResult<DateTime<Utc>> {
        self.as_str().into_timestamp()
    }
}

/// Calendar dates accepted by the aggregated fetch
pub trait IntoDate {
    fn into_date(self) -> LenedaResult<NaiveDate>;
}

impl IntoDate for NaiveDate {
    fn into_date(self) -> LenedaResult<NaiveDate> {
        Ok(self)
    }
}

impl IntoDate for NaiveDateTime {
    fn into_date(self) -> LenedaResult<NaiveDate> {
        Ok(self.date())
    }
}

/// The date as seen in the value's own zone
impl<Tz: TimeZone> IntoDate for DateTime<Tz> {
    fn into_date(self) -> LenedaResult<NaiveDate> {
        Ok(self.date_naive())
    }
}

impl IntoDate for &str {
    fn into_date(self) -> LenedaResult<NaiveDate> {
        NaiveDate::parse_from_str(self.trim(), "%Y-%m-%d")
            .map_err(|_| LenedaError::InvalidInput(format!("'{self}' is not a YYYY-MM-DD date")))
    }
}

impl IntoDate for String {
    fn into_date(self) -> LenedaResult<NaiveDate> {
        self.as_str().into_date()
    }
}

impl IntoDate for &String {
    fn into_date(self) -> LenedaResult<NaiveDate> {
        self.as_str().into_date()
    }
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Body of a metering-data access request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessRequest {
    /// Energy id of the requesting account
    pub from: String,
    /// Display name shown to the data owner
    pub from_name: String,
    pub metering_point_codes: Vec<String>,
    pub obis_codes: Vec<ObisCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<NaiveDate>,
}

impl AccessRequest {
    pub fn new(from: impl Into<String>, from_name: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            from_name: from_name.into(),
            metering_point_codes: Vec::new(),
            obis_codes: Vec::new(),
            expires_at: None,
        }
    }

    pub fn metering_point(mut self, code: impl Into<String>) -> Self {
        self.metering_point_codes.push(code.into());
        self
    }

    pub fn obis_code(mut self, code: ObisCode) -> Self {
        self.obis_codes.push(code);
        self
    }

    pub fn expires_at(mut self, date: NaiveDate) -> Self {
        self.expires_at = Some(date);
        self
    }

    pub fn validate(&self) -> LenedaResult<()> {
        if self.from.trim().is_empty() {
            return Err(LenedaError::InvalidInput(
                "access request needs the requesting energy id".to_string(),
            ));
        }
        if self.metering_point_codes.is_empty() {
            return Err(LenedaError::InvalidInput(
                "access request needs at least one metering point".to_string(),
            ));
        }
        if self.metering_point_codes.iter().any(|c| c.trim().is_empty()) {
            return Err(LenedaError::InvalidInput(
                "access request contains an empty metering point code".to_string(),
            ));
        }
        if self.obis_codes.is_empty() {
            return Err(LenedaError::InvalidInput(
                "access request needs at least one OBIS code".to_string(),
            ));
        }
        Ok(())
    }
}
