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


use clap::{Args, Parser, Subcommand};
use chrono::NaiveDate;
use leneda_client::{AggregationLevel, LenedaClient, ObisCode, TransformationMode};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "leneda",
    version,
    about = "Leneda energy metering connector",
    long_about = "Polls yearly energy totals from the Leneda platform for every configured\n\
    metering point, and offers one-shot access to the raw API.\n\
    \nExamples:\n  \
    leneda                                   # Run with config.toml / config.json\n  \
    leneda setup --energy-id LU-ID --metering-points LU0000...,LU0001... --config leneda.toml\n  \
    leneda fetch --metering-point LU0000... --start 2024-01-01T00:00:00Z --end 2024-01-02T00:00:00Z\n  \
    leneda validate-config --config leneda.toml"
)]
pub struct Cli {
    /// Config file (TOML or JSON by extension)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the refresh loop for all configured entries (default)
    Run,

    /// Print the raw time series of one metering point
    Fetch(FetchArgs),

    /// Print an aggregated time series of one metering point
    Aggregated(AggregatedArgs),

    /// Ask a data owner for access to their metering data
    RequestAccess(RequestAccessArgs),

    /// Add a config entry, or merge points into an existing one, after a
    /// credential check; writes the config file
    Setup(SetupArgs),

    /// Load and validate the configuration, then exit
    ValidateConfig(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct SetupArgs {
    #[arg(long, env = "LENEDA_API_TOKEN", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "LENEDA_ENERGY_ID")]
    pub energy_id: String,

    /// Comma-separated metering point codes
    #[arg(long, env = "LENEDA_METERING_POINTS")]
    pub metering_points: String,

    #[arg(long, env = "LENEDA_BASE_URL")]
    pub base_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Skip the trial fetch that checks each entry's credentials
    #[arg(long)]
    pub offline: bool,
}

#[derive(Debug, Args)]
pub struct Credentials {
    #[arg(long, env = "LENEDA_API_TOKEN", hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "LENEDA_ENERGY_ID")]
    pub energy_id: String,

    #[arg(long, env = "LENEDA_BASE_URL")]
    pub base_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl Credentials {
    pub fn client(&self) -> anyhow::Result<LenedaClient> {
        let mut builder = LenedaClient::builder(&self.api_key, &self.energy_id);
        if let Some(url) = &self.base_url {
            builder = builder.base_url(url);
        }
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(builder.build()?)
    }
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[command(flatten)]
    pub credentials: Credentials,

    #[arg(long)]
    pub metering_point: String,

    #[arg(long, default_value = "1-1:1.29.0")]
    pub obis_code: ObisCode,

    /// ISO-8601 start timestamp, e.g. 2024-01-01T00:00:00Z
    #[arg(long)]
    pub start: String,

    #[arg(long)]
    pub end: String,
}

#[derive(Debug, Args)]
pub struct AggregatedArgs {
    #[command(flatten)]
    pub credentials: Credentials,

    #[arg(long)]
    pub metering_point: String,

    #[arg(long, default_value = "1-1:1.29.0")]
    pub obis_code: ObisCode,

    /// YYYY-MM-DD
    #[arg(long)]
    pub start_date: NaiveDate,

    #[arg(long)]
    pub end_date: NaiveDate,

    #[arg(long, default_value = "Month", help = "Hour, Day, Week, Month, Year or Infinite")]
    pub level: AggregationLevel,

    #[arg(long, default_value = "Accumulation", help = "Accumulation, Latest or Difference")]
    pub mode: TransformationMode,
}

#[derive(Debug, Args)]
pub struct RequestAccessArgs {
    #[command(flatten)]
    pub credentials: Credentials,

    /// Name shown to the data owner
    #[arg(long)]
    pub from_name: String,

    #[arg(long = "metering-point", required = true)]
    pub metering_points: Vec<String>,

    #[arg(long = "obis-code", required = true)]
    pub obis_codes: Vec<ObisCode>,

    #[arg(long)]
    pub expires_at: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["leneda"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_aggregated_args() {
        let cli = Cli::try_parse_from([
            "leneda",
            "aggregated",
            "--api-key",
            "key",
            "--energy-id",
            "energy",
            "--metering-point",
            "LU-1",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-12-31",
            "--level",
            "day",
        ])
        .unwrap();

        let Some(Commands::Aggregated(args)) = cli.command else {
            panic!("expected aggregated");
        };
        assert_eq!(args.obis_code, ObisCode::ElectricityConsumptionActive);
        assert_eq!(args.level, AggregationLevel::Day);
        assert_eq!(args.mode, TransformationMode::Accumulation);
        assert_eq!(args.credentials.client().unwrap().energy_id(), "energy");
    }

    #[test]
    fn test_unknown_obis_code_is_rejected() {
        let result = Cli::try_parse_from([
            "leneda",
            "fetch",
            "--api-key",
            "key",
            "--energy-id",
            "energy",
            "--metering-point",
            "LU-1",
            "--obis-code",
            "9-9:9.9.9",
            "--start",
            "2024-01-01T00:00:00Z",
            "--end",
            "2024-01-02T00:00:00Z",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_request_access_collects_repeated_flags() {
        let cli = Cli::try_parse_from([
            "leneda",
            "request-access",
            "--api-key",
            "key",
            "--energy-id",
            "energy",
            "--from-name",
            "Test User",
            "--metering-point",
            "LU-1",
            "--metering-point",
            "LU-2",
            "--obis-code",
            "7-1:99.23.15",
        ])
        .unwrap();

        let Some(Commands::RequestAccess(args)) = cli.command else {
            panic!("expected request-access");
        };
        assert_eq!(args.metering_points, vec!["LU-1", "LU-2"]);
        assert_eq!(args.obis_codes, vec![ObisCode::GasConsumptionVolume]);
        assert!(args.expires_at.is_none());
    }

    #[test]
    fn test_setup_and_validate_args() {
        let cli = Cli::try_parse_from([
            "leneda",
            "setup",
            "--api-key",
            "key",
            "--energy-id",
            "energy",
            "--metering-points",
            "LU-1,LU-2",
            "--config",
            "leneda.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("leneda.toml")));
        let Some(Commands::Setup(args)) = cli.command else {
            panic!("expected setup");
        };
        assert_eq!(args.metering_points, "LU-1,LU-2");

        let cli = Cli::try_parse_from(["leneda", "validate-config", "--offline"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::ValidateConfig(ValidateArgs { offline: true }))
        ));
    }
}
