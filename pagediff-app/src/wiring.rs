use anyhow::{Context, Result};
use pagediff_config::{OracleConfig, PageDiffConfig};
use pagediff_drivers::browser::{ChromeLauncher, LaunchSettings};
use pagediff_http::HttpClient;
use pagediff_llm::build_oracle;
use pagediff_llm::comparator::Comparator;
use pagediff_llm::normalizer::ContentNormalizer;
use pagediff_web::ComparisonPipeline;
use pagediff_web::StrategySelector;
use pagediff_web::classifier::SiteClassifier;
use pagediff_web::dynamic::{DynamicExtractor, DynamicSettings};
use pagediff_web::static_extractor::StaticExtractor;
use std::sync::Arc;
use std::time::Duration;

/// Assemble the comparison pipeline from a loaded configuration.
///
/// Nothing here touches the network: the browser is only launched and the
/// oracle only called once a comparison runs.
pub fn build_from_config(cfg: &PageDiffConfig) -> Result<ComparisonPipeline> {
    let http = HttpClient::detached_with_connect_timeout(Duration::from_secs(
        cfg.http.connect_timeout_secs,
    ))
    .context("building HTTP client")?
    .with_timeout(Duration::from_secs(cfg.http.timeout_secs));

    let launcher = ChromeLauncher::new(LaunchSettings {
        webdriver_url: cfg.browser.webdriver_url.clone(),
        headless: cfg.browser.headless,
        window_width: cfg.browser.window_width,
        window_height: cfg.browser.window_height,
        user_agent: cfg.user_agent.clone(),
    });

    let selector = StrategySelector::new(
        cfg.user_agent.clone(),
        SiteClassifier::new(http.clone(), cfg.user_agent.clone()),
        StaticExtractor::new(http),
        DynamicExtractor::new(Arc::new(launcher), DynamicSettings::from(&cfg.browser)),
    );

    let normalizer = ContentNormalizer::for_model(cfg.oracle.model(), cfg.content.max_tokens)
        .context("loading tokenizer")?;

    let oracle = build_oracle(&cfg.oracle).context("building scoring oracle")?;
    let comparator = match &cfg.oracle {
        OracleConfig::Openai {
            temperature,
            max_tokens,
            ..
        } => Comparator::new(oracle)
            .with_temperature(*temperature)
            .with_max_tokens(*max_tokens),
    };

    tracing::debug!(
        target: "app",
        model = cfg.oracle.model(),
        webdriver = %cfg.browser.webdriver_url,
        max_tokens = cfg.content.max_tokens,
        "pipeline assembled"
    );
    Ok(ComparisonPipeline::new(selector, normalizer, comparator))
}
