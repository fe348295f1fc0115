use super::ui;
use crate::core::config::AppConfig;
use crate::core::{ExchangeRateProvider, ExchangeRateResult, RateQuery};
use crate::providers::sunat::SunatProvider;
use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use comfy_table::Cell;
use reqwest::header::HeaderValue;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty printed JSON, exactly as received
    #[default]
    Json,
    /// Key/value table
    Table,
}

#[derive(Clone, Default)]
pub struct FetchOptions {
    pub date: Option<NaiveDate>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub format: OutputFormat,
}

/// Picks the token from the command line (or environment), then the config file.
pub fn resolve_token(cli_token: Option<&str>, config: &AppConfig) -> Result<String> {
    let token = cli_token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| config.token.as_deref().filter(|t| !t.trim().is_empty()));

    let Some(token) = token else {
        bail!("No API token given. Use --token, SUNAT_TOKEN or the config file");
    };

    // Sent verbatim in the Authorization header
    if HeaderValue::from_str(&format!("Bearer {token}")).is_err() {
        bail!("API token contains characters not allowed in an HTTP header");
    }
    Ok(token.to_string())
}

pub fn build_provider(options: &FetchOptions, config: &AppConfig) -> SunatProvider {
    let base_url = &config.providers.sunat.base_url;
    let timeout = options
        .timeout_secs
        .map(Duration::from_secs)
        .or_else(|| config.timeout());

    match timeout {
        Some(t) => SunatProvider::with_timeout(base_url, t),
        None => SunatProvider::new(base_url),
    }
}

pub fn render(result: &ExchangeRateResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(result).context("Failed to serialize exchange rate")
        }
        OutputFormat::Table => {
            let mut table = ui::new_styled_table();
            table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);
            for (key, value) in result.as_map() {
                table.add_row(vec![Cell::new(key), ui::value_cell(value)]);
            }

            let title = match (result.currency(), result.date()) {
                (Some(currency), Some(date)) => format!("SUNAT exchange rate {currency} {date}"),
                _ => "SUNAT exchange rate".to_string(),
            };
            let source = result
                .as_map()
                .get("origen")
                .and_then(|v| v.as_str())
                .unwrap_or("apis.net.pe");
            Ok(format!(
                "{}\n{table}\n{}",
                ui::style_text(&title, ui::StyleType::Title),
                ui::style_text(&format!("Source: {source}"), ui::StyleType::Subtle)
            ))
        }
    }
}

pub async fn fetch(
    provider: &dyn ExchangeRateProvider,
    query: &RateQuery,
) -> Result<ExchangeRateResult> {
    let pb = ui::new_spinner(&format!("Fetching exchange rate for {}...", query.date));
    let result = provider.get_exchange_rate(query).await;
    pb.finish_and_clear();

    result.with_context(|| format!("Failed to fetch exchange rate for {}", query.date))
}

/// Fetches the rate and returns the text `run` prints to stdout.
pub async fn fetch_and_render(options: FetchOptions, config: &AppConfig) -> Result<String> {
    let token = resolve_token(options.token.as_deref(), config)?;
    let date = options.date.unwrap_or_else(|| Local::now().date_naive());
    let provider = build_provider(&options, config);
    debug!(%date, base_url = %config.providers.sunat.base_url, "Fetching SUNAT rate");

    let result = fetch(&provider, &RateQuery::new(date, token)).await?;
    info!(buy = ?result.buy(), sell = ?result.sell(), "Received exchange rate");

    render(&result, options.format)
}

pub async fn run(options: FetchOptions, config: &AppConfig) -> Result<()> {
    println!("{}", fetch_and_render(options, config).await?);
    Ok(())
}
