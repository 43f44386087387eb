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


use bevy_app::prelude::*;
use bevy_ecs::prelude::*;
use chrono::Datelike;
use crossbeam_channel::{Receiver, Sender};
use futures_timer::Delay;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, EntryConfig};
use crate::coordinator::{Coordinator, CoordinatorData};
use crate::entries::{EntryHandle, EntryRegistry};
use crate::sensor::{LenedaSensor, SensorKind, SensorState};

/// Resource: entries to set up and how often to refresh them
#[derive(Resource, Debug, Clone)]
pub struct LenedaSettings {
    pub entries: Vec<EntryConfig>,
    pub scan_interval: Duration,
    /// API base URL override
    pub base_url: Option<String>,
}

impl Default for LenedaSettings {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            scan_interval: Duration::from_secs(crate::config::DEFAULT_SCAN_INTERVAL_SECS),
            base_url: None,
        }
    }
}

impl From<&AppConfig> for LenedaSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            entries: config.entries.clone(),
            scan_interval: Duration::from_secs(config.scan_interval_secs),
            base_url: config.base_url.clone(),
        }
    }
}

/// Resource: runtime the refresh workers are spawned on
#[derive(Resource, Debug, Clone)]
pub struct TokioRuntimeHandle(pub tokio::runtime::Handle);

/// Message: tear down a config entry and its sensors
#[derive(Message, Debug, Clone)]
pub struct UnloadEntry {
    pub entry_id: String,
}

/// Message: set up a config entry after startup
///
/// An entry with the same id is unloaded first, so a merged entry from the
/// setup flow reloads with its new metering points.
#[derive(Message, Debug, Clone)]
pub struct SetupEntry {
    pub entry: EntryConfig,
}

/// Result of one refresh cycle of one entry
#[derive(Debug, Clone)]
pub struct RefreshUpdate {
    pub entry_id: String,
    pub data: CoordinatorData,
}

/// Component: receiving end of the refresh workers
#[derive(Component, Debug)]
pub struct RefreshChannel {
    pub receiver: Receiver<RefreshUpdate>,
}

/// Resource: sending end handed to workers started after startup
#[derive(Resource, Debug, Clone)]
pub struct RefreshSender(pub Sender<RefreshUpdate>);

#[derive(Debug)]
pub struct LenedaPlugin;

impl Plugin for LenedaPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LenedaSettings>()
            .init_resource::<EntryRegistry>()
            .add_message::<UnloadEntry>()
            .add_message::<SetupEntry>()
            .add_systems(Startup, setup_entries_system)
            // Entries are registered in Startup; workers need them in place
            .add_systems(PostStartup, spawn_refresh_workers)
            .add_systems(
                Update,
                (
                    setup_entry_system,
                    unload_entry_system,
                    poll_refresh_channel,
                    log_sensor_changes,
                )
                    .chain(),
            );
    }
}

/// Set up every configured entry and spawn its sensors
pub fn setup_entries_system(
    mut commands: Commands,
    settings: Res<LenedaSettings>,
    mut registry: ResMut<EntryRegistry>,
) {
    let year = chrono::Local::now().year();

    for entry in &settings.entries {
        if let Err(e) = registry.setup(entry, settings.base_url.as_deref()) {
            error!("❌ [LENEDA] Failed to set up entry '{}': {}", entry.id(), e);
            continue;
        }

        let count = spawn_sensors(&mut commands, entry, year);
        info!("✅ [LENEDA] Entry '{}': {} sensor(s) created", entry.id(), count);
    }
}

fn spawn_sensors(commands: &mut Commands, entry: &EntryConfig, year: i32) -> usize {
    let points = entry.metering_points();
    for point in &points {
        for kind in SensorKind::ALL {
            commands.spawn((
                LenedaSensor::new(entry.id(), &entry.energy_id, point, kind, year),
                SensorState::default(),
            ));
        }
    }
    points.len() * SensorKind::ALL.len()
}

fn despawn_sensors(
    commands: &mut Commands,
    sensors: &Query<(Entity, &LenedaSensor)>,
    entry_id: &str,
) {
    for (entity, sensor) in sensors {
        if sensor.entry_id == entry_id {
            commands.entity(entity).despawn();
        }
    }
}

fn runtime_handle(runtime: Option<&TokioRuntimeHandle>) -> Option<tokio::runtime::Handle> {
    if let Some(runtime) = runtime {
        return Some(runtime.0.clone());
    }
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!("❌ [LENEDA] No tokio runtime for refresh workers: {}", e);
            None
        }
    }
}

fn spawn_worker(
    handle: &tokio::runtime::Handle,
    tx: &Sender<RefreshUpdate>,
    entry_id: &str,
    entry: &EntryHandle,
    interval: Duration,
) {
    handle.spawn(refresh_worker(
        entry_id.to_string(),
        entry.coordinator().clone(),
        entry.active_flag(),
        interval,
        tx.clone(),
    ));
}

/// Spawn one refresh worker per set-up entry
pub fn spawn_refresh_workers(
    mut commands: Commands,
    settings: Res<LenedaSettings>,
    registry: Res<EntryRegistry>,
    runtime: Option<Res<TokioRuntimeHandle>>,
) {
    // Channel exists even with no entries so later setups can report into it
    let (tx, rx) = crossbeam_channel::bounded(16);
    commands.spawn(RefreshChannel { receiver: rx });
    commands.insert_resource(RefreshSender(tx.clone()));

    if registry.is_empty() {
        warn!("⚠️ [LENEDA] No config entries set up, nothing to refresh");
        return;
    }

    let Some(handle) = runtime_handle(runtime.as_deref()) else {
        return;
    };

    for (entry_id, entry) in registry.iter() {
        spawn_worker(&handle, &tx, entry_id, entry, settings.scan_interval);
    }

    info!(
        "✅ [LENEDA] {} refresh worker(s) started, interval {}s",
        registry.len(),
        settings.scan_interval.as_secs()
    );
}

/// Set up entries requested at runtime and start their workers
pub fn setup_entry_system(
    mut commands: Commands,
    mut messages: MessageReader<SetupEntry>,
    settings: Res<LenedaSettings>,
    mut registry: ResMut<EntryRegistry>,
    sensors: Query<(Entity, &LenedaSensor)>,
    runtime: Option<Res<TokioRuntimeHandle>>,
    sender: Option<Res<RefreshSender>>,
) {
    let year = chrono::Local::now().year();

    for message in messages.read() {
        let entry = &message.entry;
        if registry.unload(entry.id()) {
            info!("🔄 [LENEDA] Reloading entry '{}'", entry.id());
            despawn_sensors(&mut commands, &sensors, entry.id());
        }

        let handle = match registry.setup(entry, settings.base_url.as_deref()) {
            Ok(handle) => handle,
            Err(e) => {
                error!("❌ [LENEDA] Failed to set up entry '{}': {}", entry.id(), e);
                continue;
            }
        };
        let count = spawn_sensors(&mut commands, entry, year);
        info!("✅ [LENEDA] Entry '{}': {} sensor(s) created", entry.id(), count);

        let Some(sender) = sender.as_deref() else {
            warn!(
                "⚠️ [LENEDA] Refresh channel not ready, '{}' will not refresh",
                entry.id()
            );
            continue;
        };
        let Some(tokio_handle) = runtime_handle(runtime.as_deref()) else {
            continue;
        };
        spawn_worker(&tokio_handle, &sender.0, entry.id(), handle, settings.scan_interval);
    }
}

/// Refresh immediately, then once per interval, until the entry is unloaded
async fn refresh_worker(
    entry_id: String,
    coordinator: Arc<Coordinator>,
    active: Arc<AtomicBool>,
    interval: Duration,
    tx: Sender<RefreshUpdate>,
) {
    info!("📊 [LENEDA] Refresh worker for '{}' started", entry_id);

    while active.load(Ordering::Relaxed) {
        let data = coordinator.refresh_current_year().await;

        if !active.load(Ordering::Relaxed) {
            break;
        }
        let update = RefreshUpdate {
            entry_id: entry_id.clone(),
            data,
        };
        if let Err(e) = tx.send(update) {
            error!("❌ [LENEDA] Failed to send refresh for '{}': {}", entry_id, e);
            break;
        }

        debug!("💤 [LENEDA] '{}' sleeping {}s", entry_id, interval.as_secs());
        Delay::new(interval).await;
    }

    info!("🛑 [LENEDA] Refresh worker for '{}' stopped", entry_id);
}

/// Drain refresh results and update the sensors of each entry
pub fn poll_refresh_channel(
    channels: Query<&RefreshChannel>,
    mut registry: ResMut<EntryRegistry>,
    mut sensors: Query<(&LenedaSensor, &mut SensorState)>,
) {
    for channel in &channels {
        // NON-BLOCKING
        while let Ok(update) = channel.receiver.try_recv() {
            let mut changed = 0;
            for (sensor, mut state) in &mut sensors {
                if sensor.entry_id != update.entry_id {
                    continue;
                }
                // Only flag the component when value or availability moved
                if state.bypass_change_detection().update(sensor, &update.data) {
                    state.set_changed();
                    changed += 1;
                }
            }

            if registry.store_data(&update.entry_id, update.data) {
                debug!(
                    "📊 [LENEDA] Refresh for '{}' applied, {} sensor(s) changed",
                    update.entry_id, changed
                );
            } else {
                debug!(
                    "Dropping refresh for unloaded entry '{}'",
                    update.entry_id
                );
            }
        }
    }
}

pub fn log_sensor_changes(sensors: Query<(&LenedaSensor, &SensorState), Changed<SensorState>>) {
    for (sensor, state) in &sensors {
        match (state.available, state.value) {
            (true, Some(value)) => info!(
                "🔢 [LENEDA] {} = {:.3} {}",
                sensor.unique_id(),
                value,
                sensor.kind.unit()
            ),
            _ => debug!("[LENEDA] {} unavailable", sensor.unique_id()),
        }
    }
}

/// Remove unloaded entries and despawn their sensors
pub fn unload_entry_system(
    mut commands: Commands,
    mut messages: MessageReader<UnloadEntry>,
    mut registry: ResMut<EntryRegistry>,
    sensors: Query<(Entity, &LenedaSensor)>,
) {
    for message in messages.read() {
        if !registry.unload(&message.entry_id) {
            warn!(
                "⚠️ [LENEDA] Unload requested for unknown entry '{}'",
                message.entry_id
            );
            continue;
        }
        despawn_sensors(&mut commands, &sensors, &message.entry_id);
    }
}
