use crate::{PlannerConfig, RequestContext, TripPlanner};
use anyhow::{anyhow, Context};
use clap::{Arg, ArgAction, Command};
use std::{io::Read, time::Duration};
use tracing::{error, info};

/// CLI entry point for the nusatrip planner
pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("nusatrip")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate a day-by-day travel itinerary from a trip request with Gemini")
        .arg(
            Arg::new("request")
                .help("Path to the trip request JSON, or '-' for stdin")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("model")
                .short('m')
                .long("model")
                .value_name("MODEL")
                .help("Gemini model to use (or set GEMINI_MODEL_NAME)"),
        )
        .arg(
            Arg::new("api-key")
                .short('k')
                .long("api-key")
                .value_name("KEY")
                .help("Gemini API key (or set GEMINI_API_KEY env var)"),
        )
        .arg(
            Arg::new("base-url")
                .short('u')
                .long("base-url")
                .value_name("URL")
                .help("Gemini API base URL (or set GEMINI_BASE_URL)"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .value_name("SECONDS")
                .help("Deadline for the whole synthesis in seconds")
                .default_value("120"),
        )
        .arg(
            Arg::new("max-attempts")
                .short('a')
                .long("max-attempts")
                .value_name("COUNT")
                .help("Generation attempts before giving up (or set NUSATRIP_MAX_ATTEMPTS)"),
        )
        .arg(
            Arg::new("explain")
                .long("explain")
                .action(ArgAction::SetTrue)
                .help("Print the synthesis trace instead of the bare itinerary JSON"),
        )
        .get_matches();

    let mut config =
        PlannerConfig::from_env_with_api_key(matches.get_one::<String>("api-key").cloned())?;
    if let Some(model) = matches.get_one::<String>("model") {
        config.gemini = config.gemini.with_model(model.as_str());
    }
    if let Some(base_url) = matches.get_one::<String>("base-url") {
        config.gemini = config.gemini.with_base_url(base_url.as_str());
    }
    if let Some(attempts) = matches.get_one::<String>("max-attempts") {
        let attempts: usize = attempts
            .parse()
            .with_context(|| format!("invalid --max-attempts value: {attempts}"))?;
        config.synthesis = config.synthesis.with_max_attempts(attempts);
    }

    let timeout_seconds: u64 = matches
        .get_one::<String>("timeout")
        .ok_or_else(|| anyhow!("--timeout is required"))?
        .parse()
        .context("invalid --timeout value")?;

    let path = matches
        .get_one::<String>("request")
        .ok_or_else(|| anyhow!("a trip request file is required"))?;
    let request_text = if path == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read trip request from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read trip request from {path}"))?
    };
    let request: serde_json::Value =
        serde_json::from_str(&request_text).context("trip request is not valid JSON")?;

    info!(
        model = %config.gemini.model,
        base_url = %config.gemini.base_url,
        timeout_seconds,
        "Starting itinerary synthesis"
    );

    let planner = TripPlanner::from_config(config)?;
    let context = RequestContext::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_seconds);

    match planner
        .synthesize_with_report(&request, &context, deadline)
        .await
    {
        Ok(report) => {
            if matches.get_flag("explain") {
                println!("{}", report.replay());
            } else {
                println!("{}", serde_json::to_string_pretty(&report.itinerary)?);
            }
            info!(
                attempts = report.attempt_count(),
                "Itinerary synthesis completed"
            );
            Ok(())
        }
        Err(err) => {
            error!("Itinerary synthesis failed: {}", err);
            eprintln!("{}", serde_json::to_string_pretty(&err.to_error_payload())?);
            Err(err.into())
        }
    }
}
