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


//! Interactive setup of config entries
//!
//! A host drives the flow step by step and renders whatever each step
//! returns: a menu, a form (possibly with errors) or a final outcome.

use crate::config::{EntryConfig, parse_metering_points};
use crate::errors::{IntegrationError, IntegrationResult};
use chrono::{Duration, Utc};
use leneda_client::{DEFAULT_BASE_URL, LenedaClient, LenedaResult, ObisCode};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

pub const STEP_USER: &str = "user";
pub const STEP_NEW_CREDENTIALS: &str = "new_credentials";
pub const STEP_SELECT_EXISTING: &str = "select_existing";
pub const STEP_METERING_POINTS: &str = "metering_points";

pub const FIELD_API_TOKEN: &str = "api_token";
pub const FIELD_ENERGY_ID: &str = "energy_id";
pub const FIELD_EXISTING_ENERGY_ID: &str = "existing_energy_id";
pub const FIELD_METERING_POINTS: &str = "metering_points";

/// Form-level error slot
pub const BASE_ERROR: &str = "base";

/// A form the host should show
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowForm {
    pub step_id: &'static str,
    pub fields: Vec<&'static str>,
    /// Allowed values for selection fields
    pub choices: Vec<String>,
    pub errors: BTreeMap<&'static str, &'static str>,
    pub placeholders: BTreeMap<&'static str, String>,
}

impl FlowForm {
    fn new(step_id: &'static str, fields: Vec<&'static str>) -> Self {
        Self {
            step_id,
            fields,
            ..Self::default()
        }
    }

    fn with_error(mut self, error: &'static str) -> Self {
        self.errors.insert(BASE_ERROR, error);
        self
    }

    pub fn error(&self) -> Option<&'static str> {
        self.errors.get(BASE_ERROR).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowResult {
    ShowMenu {
        step_id: &'static str,
        options: Vec<(&'static str, &'static str)>,
    },
    ShowForm(FlowForm),
    CreateEntry {
        title: String,
        entry: EntryConfig,
    },
    /// Merge into an existing entry; the host replaces and reloads it
    UpdateEntry {
        entry: EntryConfig,
    },
    Abort {
        reason: &'static str,
    },
}

impl FlowResult {
    pub fn form(&self) -> Option<&FlowForm> {
        match self {
            Self::ShowForm(form) => Some(form),
            _ => None,
        }
    }
}

/// User input of the credentials step
#[derive(Debug, Clone)]
pub struct CredentialsInput {
    pub api_token: String,
    pub energy_id: String,
}

/// One run of the setup flow
#[derive(Debug)]
pub struct ConfigFlow {
    existing: Vec<EntryConfig>,
    base_url: String,
    api_token: String,
    energy_id: String,
    merge_into: Option<EntryConfig>,
}

impl ConfigFlow {
    pub fn new(existing: Vec<EntryConfig>) -> Self {
        Self {
            existing,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: String::new(),
            energy_id: String::new(),
            merge_into: None,
        }
    }

    /// API used for the credential check
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn step_user(&mut self) -> FlowResult {
        if self.existing.is_empty() {
            return self.step_new_credentials(None);
        }

        FlowResult::ShowMenu {
            step_id: STEP_USER,
            options: vec![
                (STEP_NEW_CREDENTIALS, "Add with new energy ID"),
                (STEP_SELECT_EXISTING, "Add using existing energy ID"),
            ],
        }
    }

    pub fn step_select_existing(&mut self, energy_id: Option<&str>) -> FlowResult {
        let form = || {
            let mut form = FlowForm::new(STEP_SELECT_EXISTING, vec![FIELD_EXISTING_ENERGY_ID]);
            form.choices = self.existing.iter().map(|e| e.energy_id.clone()).collect();
            form
        };

        let Some(energy_id) = energy_id else {
            return FlowResult::ShowForm(form());
        };

        let Some(entry) = self.existing.iter().find(|e| e.energy_id == energy_id) else {
            return FlowResult::ShowForm(form().with_error("existing_config_not_found"));
        };

        self.api_token = entry.api_token.clone();
        self.energy_id = entry.energy_id.clone();
        self.merge_into = Some(entry.clone());
        FlowResult::ShowForm(metering_points_form())
    }

    pub fn step_new_credentials(&mut self, input: Option<CredentialsInput>) -> FlowResult {
        let form = FlowForm::new(
            STEP_NEW_CREDENTIALS,
            vec![FIELD_API_TOKEN, FIELD_ENERGY_ID],
        );

        let Some(input) = input else {
            return FlowResult::ShowForm(form);
        };

        let api_token = input.api_token.trim();
        let energy_id = input.energy_id.trim();
        if api_token.is_empty() || energy_id.is_empty() {
            return FlowResult::ShowForm(form.with_error("missing_credentials"));
        }
        if self.existing.iter().any(|e| e.energy_id == energy_id) {
            return FlowResult::Abort {
                reason: "already_configured",
            };
        }

        self.api_token = api_token.to_string();
        self.energy_id = energy_id.to_string();
        self.merge_into = None;
        FlowResult::ShowForm(metering_points_form())
    }

    /// Parse the points, check the credentials against the API, then create
    /// or merge the entry
    pub async fn step_metering_points(&mut self, input: Option<&str>) -> FlowResult {
        let Some(input) = input else {
            return FlowResult::ShowForm(metering_points_form());
        };

        let points = parse_metering_points(input);
        let Some(first) = points.first() else {
            return FlowResult::ShowForm(metering_points_form().with_error("invalid_metering_points"));
        };
        if self.api_token.is_empty() || self.energy_id.is_empty() {
            return FlowResult::ShowForm(metering_points_form().with_error("unknown"));
        }

        if let Err(e) = self.check_credentials(first).await {
            warn!("⚠️ [LENEDA] Credential check for {} failed: {}", self.energy_id, e);
            let mut form = metering_points_form().with_error("cannot_connect");
            form.placeholders.insert("error", e);
            return FlowResult::ShowForm(form);
        }

        match &self.merge_into {
            Some(existing) => {
                let merged: BTreeSet<String> = existing
                    .metering_points()
                    .into_iter()
                    .chain(points)
                    .collect();
                let mut entry = existing.clone();
                entry.metering_points = merged.into_iter().collect::<Vec<_>>().join(",");
                info!(
                    "✅ [LENEDA] Merged metering points into entry '{}'",
                    entry.id()
                );
                FlowResult::UpdateEntry { entry }
            }
            None => {
                let entry = EntryConfig::new(&self.api_token, &self.energy_id, points.join(","));
                info!("✅ [LENEDA] Created entry '{}'", entry.id());
                FlowResult::CreateEntry {
                    title: self.energy_id.clone(),
                    entry,
                }
            }
        }
    }

    /// Run the whole flow with answers supplied up front
    ///
    /// A known energy id takes the existing-entry branch and merges the
    /// points; anything else goes through the new-credentials step. Stops at
    /// the first form that reports an error.
    pub async fn submit(
        &mut self,
        credentials: CredentialsInput,
        metering_points: &str,
    ) -> FlowResult {
        let energy_id = credentials.energy_id.trim().to_string();
        let known = self.existing.iter().any(|e| e.energy_id == energy_id);

        let result = if known {
            self.step_select_existing(Some(energy_id.as_str()))
        } else {
            self.step_new_credentials(Some(credentials))
        };
        match &result {
            FlowResult::ShowForm(form) if form.step_id == STEP_METERING_POINTS => {}
            _ => return result,
        }

        self.step_metering_points(Some(metering_points)).await
    }

    async fn check_credentials(&self, metering_point: &str) -> Result<(), String> {
        verify_credentials(&self.api_token, &self.energy_id, &self.base_url, metering_point)
            .await
            .map_err(|e| e.to_string())
    }
}

fn metering_points_form() -> FlowForm {
    let mut form = FlowForm::new(STEP_METERING_POINTS, vec![FIELD_METERING_POINTS]);
    form.placeholders.insert(
        "metering_points_help",
        "Enter your metering point IDs separated by commas (e.g., MP001,MP002)".to_string(),
    );
    form
}

/// Trial fetch of the last 7 days of raw consumption for one metering point
///
/// Succeeds only when the API accepts the token and energy id for that point.
pub async fn verify_credentials(
    api_token: &str,
    energy_id: &str,
    base_url: &str,
    metering_point: &str,
) -> LenedaResult<()> {
    let client = LenedaClient::builder(api_token, energy_id)
        .base_url(base_url)
        .build()?;

    let end = Utc::now();
    let start = end - Duration::days(7);
    client
        .get_metering_data(
            metering_point,
            ObisCode::ElectricityConsumptionActive,
            start,
            end,
        )
        .await
        .map(|_| ())
}

/// Check an already configured entry against the API using its first point
pub async fn verify_entry(entry: &EntryConfig, base_url: Option<&str>) -> IntegrationResult<()> {
    let points = entry.metering_points();
    let Some(first) = points.first() else {
        return Err(IntegrationError::Validation(format!(
            "Entry '{}' has no metering points",
            entry.id()
        )));
    };

    verify_credentials(
        &entry.api_token,
        &entry.energy_id,
        base_url.unwrap_or(DEFAULT_BASE_URL),
        first,
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};
    use serde_json::json;

    fn existing() -> EntryConfig {
        EntryConfig::new("old-token", "energy-1", "LU-B,LU-A")
    }

    fn credentials(token: &str, energy_id: &str) -> Option<CredentialsInput> {
        Some(CredentialsInput {
            api_token: token.to_string(),
            energy_id: energy_id.to_string(),
        })
    }

    async fn mock_time_series(server: &mut ServerGuard, point: &str, status: usize) -> mockito::Mock {
        let body = json!({
            "meteringPointCode": point,
            "obisCode": "1-1:1.29.0",
            "intervalLength": "PT15M",
            "unit": "kWh",
            "items": []
        });
        server
            .mock(
                "GET",
                format!("/api/metering-points/{point}/time-series").as_str(),
            )
            .match_query(Matcher::UrlEncoded(
                "obisCode".into(),
                "1-1:1.29.0".into(),
            ))
            .with_status(status)
            .with_body(if status == 200 {
                body.to_string()
            } else {
                "Unauthorized".to_string()
            })
            .create_async()
            .await
    }

    #[test]
    fn test_user_step_without_entries_shows_credentials_form() {
        let mut flow = ConfigFlow::new(vec![]);
        let form = flow.step_user().form().cloned().unwrap();
        assert_eq!(form.step_id, STEP_NEW_CREDENTIALS);
        assert_eq!(form.fields, vec![FIELD_API_TOKEN, FIELD_ENERGY_ID]);
        assert!(form.errors.is_empty());
    }

    #[test]
    fn test_user_step_with_entries_shows_menu() {
        let mut flow = ConfigFlow::new(vec![existing()]);
        match flow.step_user() {
            FlowResult::ShowMenu { step_id, options } => {
                assert_eq!(step_id, STEP_USER);
                let ids: Vec<_> = options.iter().map(|o| o.0).collect();
                assert_eq!(ids, vec![STEP_NEW_CREDENTIALS, STEP_SELECT_EXISTING]);
            }
            other => panic!("expected menu, got {other:?}"),
        }
    }

    #[test]
    fn test_new_credentials_validation() {
        let mut flow = ConfigFlow::new(vec![existing()]);

        let blank = flow.step_new_credentials(credentials(" ", "energy-2"));
        assert_eq!(blank.form().unwrap().error(), Some("missing_credentials"));

        let duplicate = flow.step_new_credentials(credentials("token", "energy-1"));
        assert_eq!(
            duplicate,
            FlowResult::Abort {
                reason: "already_configured"
            }
        );

        let next = flow.step_new_credentials(credentials("token", "energy-2"));
        assert_eq!(next.form().unwrap().step_id, STEP_METERING_POINTS);
    }

    #[test]
    fn test_select_existing() {
        let mut flow = ConfigFlow::new(vec![existing()]);

        let form = flow.step_select_existing(None).form().cloned().unwrap();
        assert_eq!(form.choices, vec!["energy-1"]);

        let unknown = flow.step_select_existing(Some("energy-9"));
        assert_eq!(
            unknown.form().unwrap().error(),
            Some("existing_config_not_found")
        );

        let next = flow.step_select_existing(Some("energy-1"));
        assert_eq!(next.form().unwrap().step_id, STEP_METERING_POINTS);
    }

    #[tokio::test]
    async fn test_empty_metering_points_rejected_without_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let mut flow = ConfigFlow::new(vec![]).with_base_url(format!("{}/api", server.url()));
        flow.step_new_credentials(credentials("token", "energy-2"));
        let result = flow.step_metering_points(Some(" , ")).await;

        assert_eq!(
            result.form().unwrap().error(),
            Some("invalid_metering_points")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_entry_after_credential_check() {
        let mut server = Server::new_async().await;
        let mock = mock_time_series(&mut server, "LU-1", 200).await;

        let mut flow = ConfigFlow::new(vec![]).with_base_url(format!("{}/api", server.url()));
        flow.step_new_credentials(credentials("token", "energy-2"));
        let result = flow.step_metering_points(Some("LU-1, LU-2")).await;

        assert_eq!(
            result,
            FlowResult::CreateEntry {
                title: "energy-2".to_string(),
                entry: EntryConfig::new("token", "energy-2", "LU-1,LU-2"),
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_credential_failure_is_shown_verbatim() {
        let mut server = Server::new_async().await;
        let mock = mock_time_series(&mut server, "LU-1", 401).await;

        let mut flow = ConfigFlow::new(vec![]).with_base_url(format!("{}/api", server.url()));
        flow.step_new_credentials(credentials("bad-token", "energy-2"));
        let result = flow.step_metering_points(Some("LU-1")).await;

        let form = result.form().unwrap();
        assert_eq!(form.step_id, STEP_METERING_POINTS);
        assert_eq!(form.error(), Some("cannot_connect"));
        assert_eq!(
            form.placeholders.get("error").map(String::as_str),
            Some("Leneda API returned status 401: Unauthorized")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_existing_entry_merges_sorted_points() {
        let mut server = Server::new_async().await;
        let mock = mock_time_series(&mut server, "LU-C", 200).await;

        let mut flow = ConfigFlow::new(vec![existing()])
            .with_base_url(format!("{}/api", server.url()));
        flow.step_select_existing(Some("energy-1"));
        let result = flow.step_metering_points(Some("LU-C, LU-A")).await;

        let mut expected = existing();
        expected.metering_points = "LU-A,LU-B,LU-C".to_string();
        assert_eq!(result, FlowResult::UpdateEntry { entry: expected });
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_creates_or_merges() {
        let mut server = Server::new_async().await;
        let _mock = mock_time_series(&mut server, "LU-C", 200).await;
        let url = format!("{}/api", server.url());

        let mut flow = ConfigFlow::new(vec![existing()]).with_base_url(&url);
        let merged = flow
            .submit(credentials("ignored", "energy-1").unwrap(), "LU-C")
            .await;
        let mut expected = existing();
        expected.metering_points = "LU-A,LU-B,LU-C".to_string();
        assert_eq!(merged, FlowResult::UpdateEntry { entry: expected });

        let mut flow = ConfigFlow::new(vec![existing()]).with_base_url(&url);
        let created = flow
            .submit(credentials("token", "energy-2").unwrap(), "LU-C")
            .await;
        assert_eq!(
            created,
            FlowResult::CreateEntry {
                title: "energy-2".to_string(),
                entry: EntryConfig::new("token", "energy-2", "LU-C"),
            }
        );
    }

    #[tokio::test]
    async fn test_submit_stops_at_first_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let mut flow = ConfigFlow::new(vec![]).with_base_url(format!("{}/api", server.url()));
        let result = flow.submit(credentials("", "energy-2").unwrap(), "LU-1").await;

        let form = result.form().unwrap();
        assert_eq!(form.step_id, STEP_NEW_CREDENTIALS);
        assert_eq!(form.error(), Some("missing_credentials"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_entry_rejects_unauthorized_token() {
        let mut server = Server::new_async().await;
        let mock = mock_time_series(&mut server, "LU-B", 401).await;
        let url = format!("{}/api", server.url());

        let err = verify_entry(&existing(), Some(url.as_str())).await.unwrap_err();

        match &err {
            IntegrationError::Client(e) => assert_eq!(e.status(), Some(401)),
            other => panic!("expected client error, got {other:?}"),
        }
        assert!(
            err.to_string()
                .contains("Leneda API returned status 401: Unauthorized")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_entry_accepts_valid_token() {
        let mut server = Server::new_async().await;
        let mock = mock_time_series(&mut server, "LU-B", 200).await;
        let url = format!("{}/api", server.url());

        verify_entry(&existing(), Some(url.as_str())).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_verify_entry_without_points_is_validation_error() {
        let entry = EntryConfig::new("token", "energy-1", " , ");
        let err = verify_entry(&entry, Some("http://127.0.0.1:9/api"))
            .await
            .unwrap_err();
        assert!(matches!(err, IntegrationError::Validation(_)));
    }
}
