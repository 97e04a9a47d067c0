//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use sitesense_browser::{
    BrowserManager, HttpFetcher, PageFetcher, RobotsPolicy, build_client, shutdown_signal,
};
use sitesense_core::{CrawlSummary, ScrapeRequest, SiteSense};
use sitesense_crawler::CrawlProgress;
use sitesense_enrichment::{
    CompletionProvider, DisabledProvider, Enricher, EnrichmentSettings, OpenRouterProvider,
};
use sitesense_extractor::ExtractOptions;
use sitesense_server::AppState;
use sitesense_shared::{
    AppConfig, CrawlConfig, init_config, load_config, load_config_from, resolve_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SiteSense: turn websites into structured, AI-enriched data.
#[derive(Parser)]
#[command(
    name = "sitesense",
    version,
    about = "Scrape and crawl websites into structured content, FAQs, and product data.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.sitesense/sitesense.toml.
    #[arg(long, global = true, env = "SITESENSE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// How pages are acquired.
#[derive(Args, Clone, Debug)]
pub(crate) struct FetchArgs {
    /// Fetch raw HTML over HTTP instead of rendering in headless Chrome.
    #[arg(long = "static")]
    pub static_fetch: bool,

    /// Show the browser window.
    #[arg(long, conflicts_with = "static_fetch")]
    pub headed: bool,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the HTTP API.
    Serve {
        /// Address to listen on (defaults to [server].bind).
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Scrape a single page and print the result as JSON.
    Scrape {
        /// Page URL.
        url: String,

        /// Generate FAQs from the page content.
        #[arg(long)]
        faq: bool,

        /// Summarize and classify the page.
        #[arg(long)]
        analyze: bool,

        /// Write descriptions and keywords for detected products.
        #[arg(long)]
        products: bool,

        /// Extract company, contact, and service details.
        #[arg(long)]
        key_info: bool,

        /// Expand FAQs into question-variant training examples.
        #[arg(long)]
        training: bool,

        /// Number of FAQs to request (defaults to [enrichment].max_faqs).
        #[arg(long)]
        max_faqs: Option<usize>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Crawl a site breadth-first and print the pages as JSON.
    Crawl {
        /// Start URL. Only pages on the same host are followed.
        url: String,

        /// Page budget (defaults to [crawl_policies].max_pages).
        #[arg(short, long)]
        max_pages: Option<usize>,

        #[command(flatten)]
        fetch: FetchArgs,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitesense=info,tower_http=info",
        1 => "sitesense=debug,tower_http=debug",
        _ => "sitesense=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so JSON output on stdout stays clean.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Serve { bind, fetch } => {
            cmd_serve(&resolve_config(config_path.as_ref())?, bind, &fetch).await
        }
        Command::Scrape {
            url,
            faq,
            analyze,
            products,
            key_info,
            training,
            max_faqs,
            fetch,
        } => {
            let request = ScrapeRequest {
                url,
                generate_faq: faq,
                analyze_content: analyze,
                enhance_products: products,
                extract_key_info: key_info,
                generate_training_data: training,
                max_faqs,
            };
            cmd_scrape(&resolve_config(config_path.as_ref())?, &request, &fetch).await
        }
        Command::Crawl {
            url,
            max_pages,
            fetch,
        } => cmd_crawl(&resolve_config(config_path.as_ref())?, &url, max_pages, &fetch).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_ref()).await,
        },
    }
}

fn resolve_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// The orchestration handle plus the browser behind it, if one is used.
struct Runtime {
    sitesense: SiteSense,
    browser: Option<Arc<BrowserManager>>,
}

impl Runtime {
    fn build(config: &AppConfig, fetch: &FetchArgs) -> Result<Self> {
        let client = build_client(config.browser.navigation_timeout())?;
        let robots = RobotsPolicy::new(client.clone(), &config.crawl_policies);

        let mut browser = None;
        let fetcher: Arc<dyn PageFetcher> = if fetch.static_fetch {
            Arc::new(HttpFetcher::new(client, robots))
        } else {
            let mut browser_config = config.browser.clone();
            if fetch.headed {
                browser_config.headless = false;
            }
            let manager = Arc::new(BrowserManager::new(browser_config, robots));
            browser = Some(Arc::clone(&manager));
            manager
        };

        let sitesense = SiteSense::new(
            fetcher,
            Enricher::new(completion_provider(config)?, EnrichmentSettings::from(config)),
            ExtractOptions::new(config.enrichment.max_text_chars),
            CrawlConfig::from(config),
        );

        Ok(Self { sitesense, browser })
    }

    async fn shutdown(&self) {
        if let Some(browser) = &self.browser {
            browser.close().await;
        }
    }
}

/// OpenRouter when a key is available, otherwise a provider that fails every
/// call so enrichment steps fall back to empty results.
fn completion_provider(config: &AppConfig) -> Result<Arc<dyn CompletionProvider>> {
    match resolve_api_key(config) {
        Ok(key) => {
            let provider = OpenRouterProvider::new(key, &config.openrouter)?;
            info!(model = provider.model(), "enrichment enabled");
            Ok(Arc::new(provider))
        }
        Err(e) => {
            warn!(
                env = %config.openrouter.api_key_env,
                "no OpenRouter API key, enrichment steps will return empty results"
            );
            Ok(Arc::new(DisabledProvider::new(e.to_string())))
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(config: &AppConfig, bind: Option<SocketAddr>, fetch: &FetchArgs) -> Result<()> {
    let addr = match bind {
        Some(addr) => addr,
        None => config
            .server
            .bind
            .parse()
            .map_err(|e| eyre!("invalid [server].bind '{}': {e}", config.server.bind))?,
    };

    let runtime = Runtime::build(config, fetch)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| eyre!("failed to bind {addr}: {e}"))?;

    println!("SiteSense listening on http://{addr}");

    // The browser goes down on the first signal; requests still rendering fail.
    let hook = runtime.browser.as_ref().map(BrowserManager::install_shutdown_hook);
    let server = sitesense_server::serve(
        listener,
        AppState::new(runtime.sitesense.clone()),
        async {
            shutdown_signal().await;
            info!("shutdown signal received, draining requests");
        },
        config.server.shutdown_timeout(),
    );
    let forced = async {
        shutdown_signal().await;
        shutdown_signal().await;
        warn!("second shutdown signal received, exiting without draining");
    };

    let result = tokio::select! {
        result = server => result,
        () = forced => Ok(()),
    };

    runtime.shutdown().await;
    if let Some(hook) = hook {
        hook.abort();
    }
    result?;
    Ok(())
}

async fn cmd_scrape(config: &AppConfig, request: &ScrapeRequest, fetch: &FetchArgs) -> Result<()> {
    let runtime = Runtime::build(config, fetch)?;
    let hook = runtime.browser.as_ref().map(BrowserManager::install_shutdown_hook);

    let spinner = spinner(format!("Scraping {}", request.url));
    let result = runtime.sitesense.scrape(request).await;
    spinner.finish_and_clear();

    runtime.shutdown().await;
    if let Some(hook) = hook {
        hook.abort();
    }

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn cmd_crawl(
    config: &AppConfig,
    url: &str,
    max_pages: Option<usize>,
    fetch: &FetchArgs,
) -> Result<()> {
    let runtime = Runtime::build(config, fetch)?;
    let hook = runtime.browser.as_ref().map(BrowserManager::install_shutdown_hook);

    let reporter = CliProgress::new();
    let result = runtime.sitesense.crawl(url, max_pages, &reporter).await;
    reporter.spinner.finish_and_clear();

    runtime.shutdown().await;
    if let Some(hook) = hook {
        hook.abort();
    }

    let summary = CrawlSummary::from(result?);
    eprintln!(
        "  Crawled {} page(s), {} failure(s) in {:.1}s ({})",
        summary.pages.len(),
        summary.failures.len(),
        summary.duration_ms as f64 / 1000.0,
        summary.stop_reason
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&PathBuf>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Crawl progress rendered as an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            spinner: spinner("Starting crawl".to_string()),
        }
    }
}

impl CrawlProgress for CliProgress {
    fn page_fetched(&self, url: &str, current: usize, max_pages: usize) {
        self.spinner
            .set_message(format!("Fetched [{current}/{max_pages}] {url}"));
    }

    fn page_failed(&self, url: &str, error: &str) {
        self.spinner.println(format!("  skipped {url}: {error}"));
    }
}
