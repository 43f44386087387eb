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

use crate::errors::{LenedaError, LenedaResult};
use crate::obis::ObisCode;
use chrono::{DateTime, Duration, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One raw sample of a metering time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeteringValue {
    #[serde(deserialize_with = "decimal")]
    value: f64,
    started_at: DateTime<Utc>,
    #[serde(rename = "type")]
    kind: String,
    version: i64,
    calculated: bool,
}

impl MeteringValue {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Measurement classification, e.g. "Measured"
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn calculated(&self) -> bool {
        self.calculated
    }
}

/// Raw time series of one metering point and OBIS code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeteringData {
    metering_point_code: String,
    obis_code: ObisCode,
    interval_length: String,
    unit: String,
    items: Vec<MeteringValue>,
}

impl MeteringData {
    pub fn metering_point_code(&self) -> &str {
        &self.metering_point_code
    }

    pub fn obis_code(&self) -> ObisCode {
        self.obis_code
    }

    /// ISO-8601 duration as sent by the server, e.g. "PT15M"
    pub fn interval_length(&self) -> &str {
        &self.interval_length
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Samples in server order (chronological)
    pub fn items(&self) -> &[MeteringValue] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(|i| i.value).sum()
    }

    /// Interval length as a duration, when it only uses D/H/M/S components
    pub fn interval(&self) -> Option<Duration> {
        parse_iso8601_duration(&self.interval_length)
    }

    pub fn from_json(value: &Value) -> LenedaResult<Self> {
        from_value(value)
    }
}

/// One bucket of an aggregated series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMeteringValue {
    #[serde(deserialize_with = "decimal")]
    value: f64,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    calculated: bool,
}

impl AggregatedMeteringValue {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.ended_at
    }

    pub fn calculated(&self) -> bool {
        self.calculated
    }

    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMeteringData {
    unit: String,
    aggregated_time_series: Vec<AggregatedMeteringValue>,
}

impl AggregatedMeteringData {
    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn aggregated_time_series(&self) -> &[AggregatedMeteringValue] {
        &self.aggregated_time_series
    }

    pub fn is_empty(&self) -> bool {
        self.aggregated_time_series.is_empty()
    }

    /// Sum of all bucket values
    pub fn total(&self) -> f64 {
        self.aggregated_time_series.iter().map(|b| b.value).sum()
    }

    pub fn from_json(value: &Value) -> LenedaResult<Self> {
        let data: Self = from_value(value)?;

        for (idx, bucket) in data.aggregated_time_series.iter().enumerate() {
            if bucket.ended_at <= bucket.started_at {
                return Err(LenedaError::parse(
                    format!("aggregatedTimeSeries[{idx}].endedAt"),
                    format!(
                        "bucket ends at {} which is not after its start {}",
                        bucket.ended_at, bucket.started_at
                    ),
                ));
            }
        }
        Ok(data)
    }
}

/// Deserialize a response, naming the field that failed
fn from_value<T: DeserializeOwned>(value: &Value) -> LenedaResult<T> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = err.path().to_string();
        let reason = err.inner().to_string();

        // Missing fields are reported against the enclosing object
        let missing = reason
            .strip_prefix("missing field `")
            .and_then(|rest| rest.split_once('`'))
            .map(|(name, _)| name);
        let field = match (path.as_str(), missing) {
            (".", Some(name)) => name.to_string(),
            (".", None) => "<root>".to_string(),
            (parent, Some(name)) => format!("{parent}.{name}"),
            (path, None) => path.to_string(),
        };
        LenedaError::parse(field, reason)
    })
}

/// Decimal values occasionally arrive quoted
fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Decimal {
        Number(f64),
        Text(String),
    }

    match Decimal::deserialize(deserializer)? {
        Decimal::Number(n) => Ok(n),
        Decimal::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("'{s}' is not a decimal number"))),
    }
}

/// Parse the subset of ISO-8601 durations the API uses (`P1D`, `PT15M`, `PT1H30M`)
///
/// Year and month components have no fixed length and yield `None`.
pub(crate) fn parse_iso8601_duration(raw: &str) -> Option<Duration> {
    let rest = raw.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };

    let mut total = Duration::zero();
    let mut seen = false;

    let mut number = String::new();
    for ch in date_part.chars() {
        if ch.is_ascii_digit() {
            number.push(ch);
            continue;
        }
        let n: i64 = number.parse().ok()?;
        number.clear();
        let part = match ch {
            'W' => Duration::try_weeks(n)?,
            'D' => Duration::try_days(n)?,
            _ => return None,
        };
        total = total.checked_add(&part)?;
        seen = true;
    }
    if !number.is_empty() {
        return None;
    }

    if let Some(time_part) = time_part {
        for ch in time_part.chars() {
            if ch.is_ascii_digit() {
                number.push(ch);
                continue;
            }
            let n: i64 = number.parse().ok()?;
            number.clear();
            let part = match ch {
                'H' => Duration::try_hours(n)?,
                'M' => Duration::try_minutes(n)?,
                'S' => Duration::try_seconds(n)?,
                _ => return None,
            };
            total = total.checked_add(&part)?;
            seen = true;
        }
        if !number.is_empty() {
            return None;
        }
    }

    seen.then_some(total)
}
