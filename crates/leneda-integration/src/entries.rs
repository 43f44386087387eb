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


//! Active config entries and their clients

use crate::config::EntryConfig;
use crate::coordinator::{Coordinator, CoordinatorData};
use crate::errors::{IntegrationError, IntegrationResult};
use bevy_ecs::prelude::*;
use leneda_client::LenedaClient;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

/// Everything owned by one set-up entry
#[derive(Debug)]
pub struct EntryHandle {
    config: EntryConfig,
    client: LenedaClient,
    coordinator: Arc<Coordinator>,
    data: Option<CoordinatorData>,
    active: Arc<AtomicBool>,
}

impl EntryHandle {
    pub fn config(&self) -> &EntryConfig {
        &self.config
    }

    pub fn client(&self) -> &LenedaClient {
        &self.client
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn data(&self) -> Option<&CoordinatorData> {
        self.data.as_ref()
    }

    /// Cleared on unload; refresh workers poll it
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }
}

/// Resource: set-up entries keyed by entry id
#[derive(Resource, Debug, Default)]
pub struct EntryRegistry {
    entries: BTreeMap<String, EntryHandle>,
}

impl EntryRegistry {
    /// Build the client and coordinator for `config`
    pub fn setup(
        &mut self,
        config: &EntryConfig,
        base_url: Option<&str>,
    ) -> IntegrationResult<&EntryHandle> {
        let id = config.id().to_string();
        if self.entries.contains_key(&id) {
            return Err(IntegrationError::AlreadySetUp(id));
        }

        let metering_points = config.metering_points();
        if metering_points.is_empty() {
            return Err(IntegrationError::Validation(format!(
                "Entry '{id}' has no metering points"
            )));
        }

        let mut builder = LenedaClient::builder(&config.api_token, &config.energy_id);
        if let Some(url) = base_url {
            builder = builder.base_url(url);
        }
        let client = builder.build()?;
        let coordinator = Arc::new(Coordinator::new(
            Arc::new(client.clone()),
            metering_points,
        ));

        info!(
            "🔌 [LENEDA] Set up entry '{}' with {} metering point(s)",
            id,
            coordinator.metering_points().len()
        );

        let handle = self.entries.entry(id).or_insert(EntryHandle {
            config: config.clone(),
            client,
            coordinator,
            data: None,
            active: Arc::new(AtomicBool::new(true)),
        });
        Ok(&*handle)
    }

    /// Returns false when the entry was not set up
    pub fn unload(&mut self, id: &str) -> bool {
        match self.entries.remove(id) {
            Some(handle) => {
                handle.active.store(false, Ordering::Relaxed);
                info!("🔌 [LENEDA] Unloaded entry '{}'", id);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&EntryHandle> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntryHandle)> {
        self.entries.iter().map(|(id, h)| (id.as_str(), h))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns false when the entry is gone, e.g. unloaded mid-refresh
    pub fn store_data(&mut self, id: &str, data: CoordinatorData) -> bool {
        match self.entries.get_mut(id) {
            Some(handle) => {
                handle.data = Some(data);
                true
            }
            None => false,
        }
    }

    pub fn data(&self, id: &str) -> Option<&CoordinatorData> {
        self.entries.get(id).and_then(EntryHandle::data)
    }
}
