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


//! Yearly readings per metering point, refreshed on a fixed schedule

use crate::sensor::SensorKind;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use leneda_client::{
    AggregatedMeteringData, AggregationLevel, LenedaClient, LenedaResult, ObisCode,
    TransformationMode,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Source of aggregated series
#[async_trait]
pub trait MeteringSource: Send + Sync {
    async fn aggregated(
        &self,
        metering_point: &str,
        obis_code: ObisCode,
        start_date: NaiveDate,
        end_date: NaiveDate,
        aggregation_level: AggregationLevel,
        transformation_mode: TransformationMode,
    ) -> LenedaResult<AggregatedMeteringData>;
}

#[async_trait]
impl MeteringSource for LenedaClient {
    async fn aggregated(
        &self,
        metering_point: &str,
        obis_code: ObisCode,
        start_date: NaiveDate,
        end_date: NaiveDate,
        aggregation_level: AggregationLevel,
        transformation_mode: TransformationMode,
    ) -> LenedaResult<AggregatedMeteringData> {
        self.get_aggregated_metering_data(
            metering_point,
            obis_code,
            start_date,
            end_date,
            aggregation_level,
            transformation_mode,
        )
        .await
    }
}

/// Year-to-date totals of one metering point
///
/// A `None` field means no value is known for that quantity this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MeterReadings {
    pub consumption: Option<f64>,
    pub production: Option<f64>,
    pub gas_consumption: Option<f64>,
}

impl MeterReadings {
    pub fn get(&self, kind: SensorKind) -> Option<f64> {
        match kind {
            SensorKind::ElectricityConsumption => self.consumption,
            SensorKind::ElectricityProduction => self.production,
            SensorKind::GasConsumption => self.gas_consumption,
        }
    }

    fn set(&mut self, kind: SensorKind, value: Option<f64>) {
        match kind {
            SensorKind::ElectricityConsumption => self.consumption = value,
            SensorKind::ElectricityProduction => self.production = value,
            SensorKind::GasConsumption => self.gas_consumption = value,
        }
    }
}

/// Outcome of one refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorData {
    pub year: i32,
    pub refreshed_at: DateTime<Utc>,
    /// `None` when every quantity of the point failed to load
    pub meters: BTreeMap<String, Option<MeterReadings>>,
}

impl CoordinatorData {
    pub fn readings(&self, metering_point: &str) -> Option<&MeterReadings> {
        self.meters.get(metering_point).and_then(Option::as_ref)
    }

    pub fn value(&self, metering_point: &str, kind: SensorKind) -> Option<f64> {
        self.readings(metering_point).and_then(|r| r.get(kind))
    }
}

/// Refreshes the yearly totals of one config entry's metering points
pub struct Coordinator {
    source: Arc<dyn MeteringSource>,
    metering_points: Vec<String>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("metering_points", &self.metering_points)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(source: Arc<dyn MeteringSource>, metering_points: Vec<String>) -> Self {
        Self {
            source,
            metering_points,
        }
    }

    pub fn metering_points(&self) -> &[String] {
        &self.metering_points
    }

    pub async fn refresh_current_year(&self) -> CoordinatorData {
        self.refresh(chrono::Local::now().year()).await
    }

    /// Monthly accumulation from Jan 1 to Dec 31 of `year`, summed per quantity
    ///
    /// Never fails: anything that could not be loaded is absent in the result.
    pub async fn refresh(&self, year: i32) -> CoordinatorData {
        let mut meters = BTreeMap::new();

        let range = NaiveDate::from_ymd_opt(year, 1, 1).zip(NaiveDate::from_ymd_opt(year, 12, 31));
        let Some((start, end)) = range else {
            error!("❌ [LENEDA] Year {} is out of range", year);
            for point in &self.metering_points {
                meters.insert(point.clone(), None);
            }
            return CoordinatorData {
                year,
                refreshed_at: Utc::now(),
                meters,
            };
        };

        for point in &self.metering_points {
            let readings = self.refresh_point(point, start, end).await;
            meters.insert(point.clone(), readings);
        }

        let available = meters.values().filter(|r| r.is_some()).count();
        info!(
            "📊 [LENEDA] Refreshed {} metering point(s) for {}: {} available",
            meters.len(),
            year,
            available
        );

        CoordinatorData {
            year,
            refreshed_at: Utc::now(),
            meters,
        }
    }

    async fn refresh_point(
        &self,
        point: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<MeterReadings> {
        let mut readings = MeterReadings::default();
        let mut failures = 0;

        for kind in SensorKind::ALL {
            let result = self
                .source
                .aggregated(
                    point,
                    kind.obis_code(),
                    start,
                    end,
                    AggregationLevel::Month,
                    TransformationMode::Accumulation,
                )
                .await;

            match result {
                Ok(series) if series.is_empty() => {
                    debug!("No {} data available for {}", kind.key(), point);
                }
                Ok(series) => readings.set(kind, Some(series.total())),
                Err(e) => {
                    warn!(
                        "⚠️ [LENEDA] Could not fetch {} for {}: {}",
                        kind.key(),
                        point,
                        e
                    );
                    failures += 1;
                }
            }
        }

        if failures == SensorKind::ALL.len() {
            error!("❌ [LENEDA] Error fetching data for metering point {}", point);
            return None;
        }
        Some(readings)
    }
}
