use anyhow::{Context, Result};
use log::info;
use serde_json::Value;

use crate::api::{ReportRequest, TenantApi};

pub mod config;

use config::Config;

/// Logs in and returns the business API of the user's school.
#[tracing::instrument(skip(config))]
pub async fn connect(config: &Config) -> Result<TenantApi> {
    let session = config
        .bootstrap()?
        .connect(&config.email, &config.password)
        .await?;
    info!("Connected to school {}", session.school_code());
    Ok(TenantApi::new(session))
}

/// Print the attendance status of all classrooms
#[tracing::instrument(skip(config))]
pub async fn attendance(config: Config) -> Result<()> {
    let api = connect(&config).await?;
    print_json(&api.attendance_info().await?)
}

/// Print all activities of the school
#[tracing::instrument(skip(config))]
pub async fn activities(config: Config) -> Result<()> {
    let api = connect(&config).await?;
    print_json(&api.activities().await?)
}

/// Print the attendance report for the given activities
#[tracing::instrument(skip(config, request))]
pub async fn report(config: Config, request: ReportRequest) -> Result<()> {
    let api = connect(&config).await?;
    print_json(&api.activity_attendance_report(&request).await?)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", render_json(value)?);
    Ok(())
}

fn render_json(value: &Value) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to render response as JSON")
}
