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
use crate::models::{AggregatedMeteringData, MeteringData};
use crate::obis::IntoObisCode;
use crate::params::{
    AccessRequest, AggregationLevel, IntoDate, IntoTimestamp, TransformationMode, format_date,
    format_timestamp,
};
use crate::transport::{DEFAULT_BASE_URL, Transport};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Leneda REST API client
///
/// Stateless apart from the credentials fixed at construction, so it can be
/// cloned and shared between tasks freely.
#[derive(Debug, Clone)]
pub struct LenedaClient {
    transport: Transport,
}

/// Builder for a client with a non-default base URL, timeout or HTTP client
#[derive(Debug)]
pub struct LenedaClientBuilder {
    api_key: String,
    energy_id: String,
    base_url: String,
    timeout: Option<Duration>,
    http_client: Option<Client>,
}

impl LenedaClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Per-request timeout. None by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use a preconfigured reqwest client. Overrides `timeout`.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> LenedaResult<LenedaClient> {
        if self.api_key.trim().is_empty() {
            return Err(LenedaError::Config("API key must not be empty".to_string()));
        }
        if self.energy_id.trim().is_empty() {
            return Err(LenedaError::Config("energy id must not be empty".to_string()));
        }

        let client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build().map_err(|e| {
                    LenedaError::Config(format!("Failed to build HTTP client: {e}"))
                })?
            }
        };

        Ok(LenedaClient {
            transport: Transport::new(self.base_url, self.api_key, self.energy_id, client),
        })
    }
}

impl LenedaClient {
    /// Client against the production API
    pub fn new(api_key: impl Into<String>, energy_id: impl Into<String>) -> LenedaResult<Self> {
        Self::builder(api_key, energy_id).build()
    }

    pub fn builder(api_key: impl Into<String>, energy_id: impl Into<String>) -> LenedaClientBuilder {
        LenedaClientBuilder {
            api_key: api_key.into(),
            energy_id: energy_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            http_client: None,
        }
    }

    pub fn energy_id(&self) -> &str {
        self.transport.energy_id()
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    /// Raw time series of one metering point
    ///
    /// # Arguments
    /// * `metering_point` - Metering point code, e.g. "LU0000010637000000000000070232451"
    /// * `obis_code` - `ObisCode` or its wire string
    /// * `start`, `end` - Zoned/naive timestamps or ISO-8601 strings, sent as UTC
    pub async fn get_metering_data(
        &self,
        metering_point: &str,
        obis_code: impl IntoObisCode,
        start: impl IntoTimestamp,
        end: impl IntoTimestamp,
    ) -> LenedaResult<MeteringData> {
        let obis_code = obis_code.into_obis_code()?;
        let start = start.into_timestamp()?;
        let end = end.into_timestamp()?;
        if end < start {
            return Err(LenedaError::InvalidInput(format!(
                "end {end} is before start {start}"
            )));
        }

        let path = format!("metering-points/{}/time-series", encode_point(metering_point)?);
        debug!(
            "📊 [LENEDA] Time series for {} ({}) {} .. {}",
            metering_point, obis_code, start, end
        );

        let query = [
            ("obisCode", obis_code.to_string()),
            ("startDateTime", format_timestamp(start)),
            ("endDateTime", format_timestamp(end)),
        ];
        let body = self.transport.get(&path, &query).await?;
        let data = MeteringData::from_json(&body)?;

        debug!(
            "✅ [LENEDA] {} items ({}) for {}",
            data.items().len(),
            data.unit(),
            metering_point
        );
        Ok(data)
    }

    /// Aggregated time series of one metering point
    ///
    /// Dates are calendar dates; any time of day is dropped.
    pub async fn get_aggregated_metering_data(
        &self,
        metering_point: &str,
        obis_code: impl IntoObisCode,
        start_date: impl IntoDate,
        end_date: impl IntoDate,
        aggregation_level: AggregationLevel,
        transformation_mode: TransformationMode,
    ) -> LenedaResult<AggregatedMeteringData> {
        let obis_code = obis_code.into_obis_code()?;
        let start_date = start_date.into_date()?;
        let end_date = end_date.into_date()?;
        if end_date < start_date {
            return Err(LenedaError::InvalidInput(format!(
                "end date {end_date} is before start date {start_date}"
            )));
        }

        let path = format!(
            "metering-points/{}/time-series/aggregated",
            encode_point(metering_point)?
        );
        debug!(
            "📊 [LENEDA] Aggregated {} series for {} ({}) {} .. {} [{}]",
            aggregation_level, metering_point, obis_code, start_date, end_date, transformation_mode
        );

        let query = [
            ("obisCode", obis_code.to_string()),
            ("startDate", format_date(start_date)),
            ("endDate", format_date(end_date)),
            ("aggregationLevel", aggregation_level.to_string()),
            ("transformationMode", transformation_mode.to_string()),
        ];
        let body = self.transport.get(&path, &query).await?;
        let data = AggregatedMeteringData::from_json(&body)?;

        debug!(
            "✅ [LENEDA] {} buckets ({}) for {}",
            data.aggregated_time_series().len(),
            data.unit(),
            metering_point
        );
        Ok(data)
    }

    /// Ask a data owner for access to their metering data
    ///
    /// Returns the server acknowledgement as-is (request id and status).
    pub async fn request_metering_data_access(&self, request: &AccessRequest) -> LenedaResult<Value> {
        request.validate()?;

        let body = serde_json::to_value(request)
            .map_err(|e| LenedaError::InvalidInput(format!("access request not serializable: {e}")))?;
        info!(
            "📨 [LENEDA] Requesting access to {} metering point(s) for {}",
            request.metering_point_codes.len(),
            request.from
        );

        let response = self
            .transport
            .post("metering-data-access-request", &body)
            .await?;
        info!("✅ [LENEDA] Access request submitted");
        Ok(response)
    }
}

fn encode_point(metering_point: &str) -> LenedaResult<String> {
    let trimmed = metering_point.trim();
    if trimmed.is_empty() {
        return Err(LenedaError::InvalidInput(
            "metering point code must not be empty".to_string(),
        ));
    }
    Ok(urlencoding::encode(trimmed).into_owned())
}
