use anyhow::Result;
use clap::Parser;
use rollcall::api::ReportRequest;
use rollcall::commands::{self, config::Config};

/// rollcall - school attendance client
///
/// Logs in with your school account and prints attendance data as JSON.
///
/// Credentials can be given as flags or through ROLLCALL_EMAIL and
/// ROLLCALL_PASSWORD.
///
/// Examples:
///   rollcall --email you@school.org attendance
///   rollcall activities
///   rollcall report --activity 10 --activity 11 --from 2024-01-01 --to 2024-01-31
#[derive(Parser, Debug)]
#[command(author, version = env!("ROLLCALL_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Account email address (also via ROLLCALL_EMAIL)
    #[arg(long, env = "ROLLCALL_EMAIL", value_name = "EMAIL", global = true)]
    pub email: Option<String>,

    /// Account password (also via ROLLCALL_PASSWORD)
    #[arg(
        long,
        env = "ROLLCALL_PASSWORD",
        hide_env_values = true,
        value_name = "PASSWORD",
        global = true
    )]
    pub password: Option<String>,

    /// Runtime configuration URL (also via ROLLCALL_CONFIG_URL)
    #[arg(long = "config-url", env = "ROLLCALL_CONFIG_URL", value_name = "URL", global = true)]
    pub config_url: Option<String>,

    /// Show debug output
    #[arg(long, short = 'd', global = true)]
    pub debug: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show the attendance status of all classrooms
    Attendance,

    /// List all activities
    Activities,

    /// Build the activity attendance report
    Report(ReportArgs),
}

#[derive(clap::Args, Debug)]
pub struct ReportArgs {
    /// Activity id to include (repeatable)
    #[arg(long = "activity", value_name = "ID", required = true)]
    pub activities: Vec<String>,

    /// Grade id to include (repeatable)
    #[arg(long = "grade", value_name = "ID")]
    pub grades: Vec<String>,

    /// Site prefix
    #[arg(long = "site-prefix", value_name = "PREFIX", default_value = "")]
    pub site_prefix: String,

    /// First day of the report (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub from: String,

    /// Last day of the report (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub to: String,
}

impl From<ReportArgs> for ReportRequest {
    fn from(args: ReportArgs) -> Self {
        ReportRequest {
            activity_ids: args.activities,
            site_prefix: args.site_prefix,
            from_date: args.from,
            to_date: args.to,
            grade_ids: args.grades,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "rollcall=debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config = Config::new(
        cli.email.unwrap_or_default(),
        cli.password.unwrap_or_default(),
        cli.config_url,
    )?;

    match cli.command {
        Commands::Attendance => commands::attendance(config).await?,
        Commands::Activities => commands::activities(config).await?,
        Commands::Report(args) => commands::report(config, args.into()).await?,
    }
    Ok(())
}
