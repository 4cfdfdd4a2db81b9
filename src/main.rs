use car_recommender::analyzer::{DatasetInsights, FilterOptions};
use car_recommender::client::{AnthropicClient, CompletionAdapter};
use car_recommender::config::{load_config_or_default, AppConfig};
use car_recommender::model::{CompletionError, ConfigError, LoadError};
use car_recommender::pipeline::{filter, Recommender};
use car_recommender::report;
use car_recommender::storage::DatasetCache;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "car-recommender", about = "Recommend cars from a dataset for a free-text requirement")]
struct Cli {
    /// What you are looking for in a car
    requirement: Option<String>,
    #[arg(long, default_value = "config.json")]
    config: PathBuf,
    /// Dataset path, overriding the config
    #[arg(long)]
    data: Option<PathBuf>,
    #[arg(long)]
    top_n: Option<usize>,
    #[arg(long)]
    year_min: Option<i32>,
    #[arg(long)]
    year_max: Option<i32>,
    /// Allowed manufacturer (repeatable)
    #[arg(long = "make")]
    makes: Vec<String>,
    /// Allowed vehicle size class (repeatable)
    #[arg(long = "body-type")]
    body_types: Vec<String>,
    /// Print dataset insights
    #[arg(long)]
    insights: bool,
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to load data: {0}")]
    Load(#[from] LoadError),
    #[error("dataset is missing critical columns: {0}")]
    MissingColumns(String),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Completion(e)) => {
            error!("Recommendation failed: {}", e);
            eprintln!("{}", report::format_error(&e));
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = load_config_or_default(&cli.config)?;
    apply_overrides(&mut config, &cli);

    let mut cache = DatasetCache::new();
    let dataset = cache.get_or_load(&config.data_path)?;

    let missing = dataset.missing_required_columns();
    if !missing.is_empty() {
        return Err(AppError::MissingColumns(missing.join(", ")));
    }

    if cli.insights || cli.requirement.is_none() {
        println!("{}", report::format_insights(&DatasetInsights::from_dataset(&dataset)));
    }

    let Some(requirement) = cli.requirement.as_deref() else {
        info!("No requirement given, nothing to recommend");
        return Ok(());
    };

    // Fill an open-ended year range from the dataset bounds.
    if cli.year_min.is_some() || cli.year_max.is_some() {
        if let Some((min, max)) = FilterOptions::from_dataset(&dataset).year_bounds {
            config.filters.year_range = Some((cli.year_min.unwrap_or(min), cli.year_max.unwrap_or(max)));
        }
    }

    let filtered = filter(&dataset, &config.filters);
    info!("Filtered dataset: {} of {} cars", filtered.len(), dataset.len());

    let api_key = std::env::var(&config.completion.api_key_env)
        .map_err(|_| CompletionError::MissingApiKey(config.completion.api_key_env.clone()))?;
    let client = AnthropicClient::new(
        api_key,
        config.completion.base_url.clone(),
        config.completion.timeout(),
    )?;
    let adapter = CompletionAdapter::new(client, config.completion.model.clone())
        .with_max_tokens(config.completion.max_tokens)
        .with_sample_size(config.completion.sample_size)
        .with_retry(config.completion.retry_policy());
    let recommender = Recommender::new(adapter);

    info!("Finding the best matches...");
    let recommendations = recommender.recommend(requirement, &filtered, config.top_n).await?;
    if recommendations.is_fallback() {
        warn!("No candidate matched the dataset, showing fallback results");
    }
    println!("{}", report::format_recommendations(&recommendations));
    Ok(())
}

fn apply_overrides(config: &mut AppConfig, cli: &Cli) {
    if let Some(path) = &cli.data {
        config.data_path = path.clone();
    }
    if let Some(top_n) = cli.top_n {
        config.top_n = top_n;
    }
    if !cli.makes.is_empty() {
        config.filters.makes = cli.makes.iter().cloned().collect();
    }
    if !cli.body_types.is_empty() {
        config.filters.body_types = cli.body_types.iter().cloned().collect();
    }
}
