use crate::infra::InProcessPlatform;
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use grant_portal::config::AppConfig;
use grant_portal::error::AppError;
use grant_portal::portal::{seed_test_environment, PortalPlatform, SeedOptions, SeedReport};
use grant_portal::telemetry;

#[derive(Args, Debug, Default)]
pub(crate) struct SeedArgs {
    /// Name of the open cycle created when none is current
    #[arg(long, default_value = "Test Cycle")]
    pub(crate) cycle_name: String,
    /// Grant deadline day for the seeded cycle (YYYY-MM-DD). Defaults to 30 days from today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) deadline: Option<NaiveDate>,
}

impl SeedArgs {
    pub(crate) fn options(&self) -> SeedOptions {
        SeedOptions {
            cycle_name: if self.cycle_name.trim().is_empty() {
                "Test Cycle".to_string()
            } else {
                self.cycle_name.clone()
            },
            deadline: self
                .deadline
                .unwrap_or_else(|| (Utc::now() + Duration::days(30)).date_naive()),
        }
    }
}

pub(crate) async fn run_seed(args: SeedArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let platform = InProcessPlatform::default();
    let report = seed_platform(&platform.platform(), &args).await?;
    print!("{}", render_seed_report(&report));
    Ok(())
}

pub(crate) async fn seed_platform(
    platform: &PortalPlatform,
    args: &SeedArgs,
) -> Result<SeedReport, AppError> {
    Ok(seed_test_environment(platform, &args.options()).await?)
}

pub(crate) fn render_seed_report(report: &SeedReport) -> String {
    if report.skipped {
        return "Test accounts already initialized.\n".to_string();
    }

    let mut output = String::from("Test accounts initialized\n");
    for account in &report.accounts {
        let status = if account.created { "created" } else { "existing" };
        output.push_str(&format!(
            "  {:<10} {:<22} {} ({status})\n",
            account.role.as_str(),
            account.email,
            account.uid
        ));
    }
    if let Some(cycle_id) = &report.cycle_id {
        output.push_str(&format!("Open cycle: {cycle_id}\n"));
    }
    output
}
