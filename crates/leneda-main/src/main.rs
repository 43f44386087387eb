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


mod cli;

use anyhow::{Context, Result, bail};
use bevy_app::{ScheduleRunnerPlugin, TaskPoolPlugin, prelude::*};
use clap::Parser;
use leneda_client::{AccessRequest, DEFAULT_BASE_URL};
use leneda_integration::{
    AppConfig, ConfigFlow, CredentialsInput, FlowForm, FlowResult, IntegrationError,
    LenedaPlugin, LenedaSettings, TokioRuntimeHandle, verify_entry,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::cli::{AggregatedArgs, Cli, Commands, FetchArgs, RequestAccessArgs, SetupArgs};

/// Written by `setup` when no `--config` is given
const DEFAULT_CONFIG_PATH: &str = "config.toml";

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Create tokio runtime for async HTTP operations
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let (mut config, source) = load_config(cli.config.as_deref())?;
            init_tracing(&config.log_level)?;
            log_config_source(source.as_deref());
            config.validate_for_run()?;
            runtime.block_on(verify_entries(&mut config))?;
            let handle = runtime.handle().clone();

            // Run the ECS app in a blocking task so tokio can keep running the workers
            runtime.block_on(async {
                tokio::task::spawn_blocking(move || run_app(&config, handle))
                    .await
                    .context("ECS task panicked")?
            })
        }
        Commands::ValidateConfig(args) => {
            let (config, source) = load_config(cli.config.as_deref())?;
            init_tracing("warn")?;
            log_config_source(source.as_deref());
            println!("✅ Configuration is valid");
            println!("   Scan interval: {}s", config.scan_interval_secs);
            for entry in &config.entries {
                println!(
                    "   - {} ({} metering point(s))",
                    entry.id(),
                    entry.metering_points().len()
                );
            }
            if args.offline {
                return Ok(());
            }
            runtime.block_on(check_credentials(&config))
        }
        Commands::Setup(args) => {
            init_tracing("info")?;
            let path = cli
                .config
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
            runtime.block_on(setup(args, &path))
        }
        Commands::Fetch(args) => {
            init_tracing("warn")?;
            runtime.block_on(fetch(args))
        }
        Commands::Aggregated(args) => {
            init_tracing("warn")?;
            runtime.block_on(aggregated(args))
        }
        Commands::RequestAccess(args) => {
            init_tracing("warn")?;
            runtime.block_on(request_access(args))
        }
    }
}

/// Respects RUST_LOG, falling back to `default_level`
fn init_tracing(default_level: &str) -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

/// Load, apply env overrides and validate. Also returns the file used, if any,
/// so it can be logged once tracing is up.
fn load_config(path: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    let source = path
        .map(Path::to_path_buf)
        .or_else(AppConfig::find_config_file);

    let mut config = match &source {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AppConfig::default(),
    };
    config.apply_env_overrides();
    config.validate().with_context(|| match &source {
        Some(path) => format!("Invalid configuration in {}", path.display()),
        None => "Invalid configuration".to_string(),
    })?;
    Ok((config, source))
}

fn log_config_source(source: Option<&Path>) {
    match source {
        Some(path) => info!("✅ Loaded configuration from {}", path.display()),
        None => warn!("No configuration file found, using defaults with environment overrides"),
    }
}

/// Trial-fetch every entry before the host accepts it
///
/// Entries the API rejects are dropped. When the API cannot be reached at
/// all the entry is kept, so a host starting before the network does not
/// lose its configuration.
async fn verify_entries(config: &mut AppConfig) -> Result<()> {
    let base_url = config.base_url.clone();
    let mut accepted = Vec::with_capacity(config.entries.len());

    for entry in std::mem::take(&mut config.entries) {
        match verify_entry(&entry, base_url.as_deref()).await {
            Ok(()) => {
                info!("✅ [LENEDA] Credentials accepted for '{}'", entry.id());
                accepted.push(entry);
            }
            Err(IntegrationError::Client(e)) if e.is_transport() && e.status().is_none() => {
                warn!(
                    "⚠️ [LENEDA] Could not reach Leneda to check '{}', keeping it: {}",
                    entry.id(),
                    e
                );
                accepted.push(entry);
            }
            Err(e) => error!("❌ [LENEDA] Rejecting entry '{}': {}", entry.id(), e),
        }
    }

    if accepted.is_empty() {
        bail!("No config entry passed the credential check");
    }
    config.entries = accepted;
    Ok(())
}

/// Trial-fetch every entry and report each failure verbatim
async fn check_credentials(config: &AppConfig) -> Result<()> {
    let mut failed = 0;
    for entry in &config.entries {
        match verify_entry(entry, config.base_url.as_deref()).await {
            Ok(()) => println!("   ✅ {}: credentials accepted", entry.id()),
            Err(e) => {
                println!("   ❌ {}: {}", entry.id(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} config entry(ies) failed the credential check");
    }
    Ok(())
}

/// Drive the setup flow with the given answers and save the resulting entry
async fn setup(args: SetupArgs, path: &Path) -> Result<()> {
    let mut config = if path.exists() {
        AppConfig::load_from(path).with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        AppConfig::default()
    };

    let base_url = args
        .base_url
        .or_else(|| config.base_url.clone())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let mut flow = ConfigFlow::new(config.entries.clone()).with_base_url(base_url);
    let credentials = CredentialsInput {
        api_token: args.api_key,
        energy_id: args.energy_id,
    };

    let entry = match flow.submit(credentials, &args.metering_points).await {
        FlowResult::CreateEntry { title, entry } => {
            println!("✅ Created entry '{title}'");
            entry
        }
        FlowResult::UpdateEntry { entry } => {
            println!("✅ Updated entry '{}'", entry.id());
            entry
        }
        FlowResult::ShowForm(form) => bail!("Setup failed: {}", form_error(&form)),
        FlowResult::Abort { reason } => bail!("Setup aborted: {reason}"),
        FlowResult::ShowMenu { step_id, .. } => bail!("Setup needs more input at '{step_id}'"),
    };
    println!("   Metering points: {}", entry.metering_points().join(", "));

    config.upsert_entry(entry);
    config
        .save_to(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("💾 Saved {}", path.display());
    Ok(())
}

/// Error key of a form, with the API's message when there is one
fn form_error(form: &FlowForm) -> String {
    match (form.error(), form.placeholders.get("error")) {
        (Some(key), Some(detail)) => format!("{key}: {detail}"),
        (Some(key), None) => key.to_string(),
        (None, _) => format!("step '{}' needs more input", form.step_id),
    }
}

fn run_app(config: &AppConfig, handle: tokio::runtime::Handle) -> Result<()> {
    info!("🚀 Starting Leneda connector");
    info!("📋 Configuration Summary:");
    info!("   Entries: {}", config.entries.len());
    for entry in &config.entries {
        info!("     - {} {:?}", entry.id(), entry.metering_points());
    }
    info!("   Scan interval: {}s", config.scan_interval_secs);
    if let Some(url) = &config.base_url {
        info!("   API base URL: {}", url);
    }

    info!("🎮 Starting ECS application...");
    let mut app = App::new();
    app
        // Add TaskPoolPlugin to initialize async task pools
        .add_plugins(TaskPoolPlugin::default())
        // Add ScheduleRunnerPlugin for headless operation
        .add_plugins(ScheduleRunnerPlugin::run_loop(Duration::from_millis(100)))
        .insert_resource(LenedaSettings::from(config))
        .insert_resource(TokioRuntimeHandle(handle))
        .add_plugins(LenedaPlugin);

    info!("✅ Starting main loop...");
    app.run();

    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn fetch(args: FetchArgs) -> Result<()> {
    let client = args.credentials.client()?;
    let data = client
        .get_metering_data(&args.metering_point, args.obis_code, &args.start, &args.end)
        .await
        .context("Failed to fetch time series")?;
    print_json(&data)
}

async fn aggregated(args: AggregatedArgs) -> Result<()> {
    let client = args.credentials.client()?;
    let data = client
        .get_aggregated_metering_data(
            &args.metering_point,
            args.obis_code,
            args.start_date,
            args.end_date,
            args.level,
            args.mode,
        )
        .await
        .context("Failed to fetch aggregated time series")?;
    print_json(&data)
}

async fn request_access(args: RequestAccessArgs) -> Result<()> {
    let client = args.credentials.client()?;
    let request = AccessRequest {
        from: args.credentials.energy_id.clone(),
        from_name: args.from_name,
        metering_point_codes: args.metering_points,
        obis_codes: args.obis_codes,
        expires_at: args.expires_at,
    };
    let response = client
        .request_metering_data_access(&request)
        .await
        .context("Access request failed")?;
    print_json(&response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use leneda_integration::EntryConfig;
    use mockito::{Matcher, Server, ServerGuard};
    use std::io::Write;
    use tempfile::Builder;

    async fn mock_time_series(server: &mut ServerGuard, status: usize, body: &str) -> mockito::Mock {
        server
            .mock("GET", Matcher::Regex(r"^/api/metering-points/.+/time-series".to_string()))
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(body)
            .create_async()
            .await
    }

    fn time_series_body() -> String {
        serde_json::json!({
            "meteringPointCode": "LU-1",
            "obisCode": "1-1:1.29.0",
            "intervalLength": "PT15M",
            "unit": "kWh",
            "items": []
        })
        .to_string()
    }

    fn setup_args(server: &ServerGuard, energy_id: &str, points: &str) -> SetupArgs {
        SetupArgs {
            api_key: "token".to_string(),
            energy_id: energy_id.to_string(),
            metering_points: points.to_string(),
            base_url: Some(format!("{}/api", server.url())),
        }
    }

    #[test]
    fn test_load_config_from_explicit_path() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
scan_interval_secs = 900

[[entries]]
api_token = "token"
energy_id = "energy-1"
metering_points = "LU-1"
"#
        )
        .unwrap();

        let (config, source) = load_config(Some(file.path())).unwrap();
        assert_eq!(config.scan_interval_secs, 900);
        assert_eq!(config.entries[0].id(), "energy-1");
        assert_eq!(source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let mut file = Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"scan_interval_secs": 0}}"#).unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("scan_interval_secs"));
    }

    #[test]
    fn test_form_error_includes_api_message() {
        let mut form = FlowForm {
            step_id: "metering_points",
            ..FlowForm::default()
        };
        assert_eq!(form_error(&form), "step 'metering_points' needs more input");

        form.errors.insert("base", "cannot_connect");
        form.placeholders
            .insert("error", "Leneda API returned status 401: Unauthorized".to_string());
        assert_eq!(
            form_error(&form),
            "cannot_connect: Leneda API returned status 401: Unauthorized"
        );
    }

    #[tokio::test]
    async fn test_setup_writes_entry_after_credential_check() {
        let mut server = Server::new_async().await;
        let _mock = mock_time_series(&mut server, 200, &time_series_body()).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leneda.toml");

        setup(setup_args(&server, "energy-1", "LU-2, LU-1"), &path)
            .await
            .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(
            config.entries,
            vec![EntryConfig::new("token", "energy-1", "LU-2,LU-1")]
        );

        // Same energy id again merges the points
        setup(setup_args(&server, "energy-1", "LU-3"), &path)
            .await
            .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.entries.len(), 1);
        assert_eq!(config.entries[0].metering_points(), vec!["LU-1", "LU-2", "LU-3"]);
    }

    #[tokio::test]
    async fn test_setup_rejected_token_writes_nothing() {
        let mut server = Server::new_async().await;
        let _mock = mock_time_series(&mut server, 401, "Unauthorized").await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leneda.toml");

        let err = setup(setup_args(&server, "energy-1", "LU-1"), &path)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Setup failed: cannot_connect: Leneda API returned status 401: Unauthorized"
        );
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_verify_entries_drops_rejected_entries() {
        let mut server = Server::new_async().await;
        let _ok = server
            .mock("GET", "/api/metering-points/LU-OK/time-series")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(time_series_body())
            .create_async()
            .await;
        let _denied = server
            .mock("GET", "/api/metering-points/LU-DENIED/time-series")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let mut config = AppConfig {
            base_url: Some(format!("{}/api", server.url())),
            entries: vec![
                EntryConfig::new("good", "energy-1", "LU-OK"),
                EntryConfig::new("bad", "energy-2", "LU-DENIED"),
            ],
            ..AppConfig::default()
        };
        verify_entries(&mut config).await.unwrap();

        let ids: Vec<_> = config.entries.iter().map(EntryConfig::id).collect();
        assert_eq!(ids, vec!["energy-1"]);

        config.entries = vec![EntryConfig::new("bad", "energy-2", "LU-DENIED")];
        let err = verify_entries(&mut config).await.unwrap_err();
        assert!(err.to_string().contains("credential check"));

        let err = check_credentials(&config).await.unwrap_err();
        assert!(err.to_string().contains("1 config entry(ies)"));
    }

    #[tokio::test]
    async fn test_verify_entries_keeps_unreachable_entries() {
        let mut config = AppConfig {
            base_url: Some("http://127.0.0.1:9/api".to_string()),
            entries: vec![EntryConfig::new("token", "energy-1", "LU-1")],
            ..AppConfig::default()
        };
        verify_entries(&mut config).await.unwrap();
        assert_eq!(config.entries.len(), 1);
    }
}
