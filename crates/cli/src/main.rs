//! Signal-Scan: command-line driver for the signal engine
//!
//! Usage:
//!   signal-scan analyze BTCUSDT                       One decision as JSON
//!   signal-scan scan --symbols BTCUSDT,ETHUSDT        Batch scan, best first
//!   signal-scan watch --symbols BTCUSDT --interval 300  Repeated scans with cooldown

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use engine::{
    BinanceClient, CandleSource, ConfluenceDecision, ConfluenceEngine, EngineError, ModelStore,
    PolicyKind, ProbabilityModel, SignalConfig, SignalCooldown, TechnicalScorer, TimeframeConfig,
};
use futures_util::future::join_all;
use tracing::{error, info, warn};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

const DEFAULT_SYMBOLS: [&str; 4] = ["BTCUSDT", "ETHUSDT", "SOLUSDT", "XRPUSDT"];

#[derive(Parser)]
#[command(name = "signal-scan")]
#[command(about = "Multi-timeframe confluence signals for crypto pairs", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct DecisionArgs {
    /// Decision policy: crossover-vote, candle-color, strict-alignment, score-gate
    #[arg(long, default_value = "crossover-vote")]
    policy: String,
    /// Primary timeframe (defaults to SIGNAL_PRIMARY_TIMEFRAME or 15m)
    #[arg(long)]
    primary: Option<String>,
    /// Higher timeframes, intermediate first (comma-separated)
    #[arg(long, value_delimiter = ',')]
    higher: Vec<String>,
    /// Candles fetched per timeframe
    #[arg(long)]
    limit: Option<u32>,
    /// Directory of classifier artifacts (<dir>/<SYMBOL>/ or <dir>/latest/)
    #[arg(long)]
    models: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide for one symbol and print the decision as JSON
    Analyze {
        symbol: String,
        #[command(flatten)]
        decision: DecisionArgs,
    },
    /// Scan symbols in bounded batches and list tradeable decisions
    Scan {
        /// Symbols to scan (comma-separated)
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        #[command(flatten)]
        decision: DecisionArgs,
        /// Show only the N most confident decisions
        #[arg(long)]
        top_n: Option<usize>,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<String>,
    },
    /// Scan repeatedly, emitting each symbol at most once per cooldown window
    Watch {
        /// Symbols to watch (comma-separated)
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
        #[command(flatten)]
        decision: DecisionArgs,
        /// Seconds between scans
        #[arg(long, default_value_t = 300)]
        interval: u64,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,signal_scan=debug")
    } else {
        EnvFilter::new("info,engine=info,signal_scan=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

/// Everything needed to decide for any symbol
struct Scanner {
    source: Arc<dyn CandleSource>,
    scorer: TechnicalScorer,
    timeframes: TimeframeConfig,
    policy: PolicyKind,
    config: SignalConfig,
    store: Option<ModelStore>,
    models: HashMap<String, Arc<dyn ProbabilityModel>>,
}

impl Scanner {
    fn new(config: SignalConfig, args: &DecisionArgs) -> anyhow::Result<Self> {
        let policy = PolicyKind::from_name(&args.policy, &config)
            .ok_or_else(|| anyhow::anyhow!("Unknown policy '{}'", args.policy))?;

        let mut timeframes = config.timeframes();
        if let Some(primary) = &args.primary {
            timeframes.primary = primary.clone();
        }
        if !args.higher.is_empty() {
            timeframes.higher = args.higher.clone();
        }
        if let Some(limit) = args.limit {
            timeframes.candle_limit = limit;
        }

        Ok(Self {
            source: Arc::new(BinanceClient::new()?),
            scorer: TechnicalScorer::default(),
            timeframes,
            policy,
            config,
            store: args.models.as_ref().map(ModelStore::new),
            models: HashMap::new(),
        })
    }

    /// Load classifiers once per symbol
    fn load_models(&mut self, symbols: &[String]) {
        let Some(store) = &self.store else {
            return;
        };
        for symbol in symbols {
            if !self.models.contains_key(symbol) {
                let classifier = store.classifier_for(symbol);
                if let Some(version) = classifier.version() {
                    info!(symbol = %symbol, version, "Loaded classifier");
                }
                self.models.insert(symbol.clone(), Arc::new(classifier));
            }
        }
    }

    fn engine_for(&self, symbol: &str) -> ConfluenceEngine {
        let engine = ConfluenceEngine::new(self.source.clone(), self.scorer.clone());
        match self.models.get(symbol) {
            Some(model) => engine.with_model(model.clone()),
            None => engine,
        }
    }

    async fn decide(&self, symbol: &str) -> Result<ConfluenceDecision, EngineError> {
        self.engine_for(symbol)
            .decide(symbol, &self.timeframes, &self.policy)
            .await
    }

    /// Decide for every symbol in batches of `batch_size`, pausing between
    /// batches. Symbols that fail are logged and skipped.
    async fn scan(&self, symbols: &[String]) -> Vec<ConfluenceDecision> {
        let batch_size = self.config.batch_size.max(1);
        let batches = symbols.chunks(batch_size).count();
        let mut decisions = Vec::with_capacity(symbols.len());

        for (i, batch) in symbols.chunks(batch_size).enumerate() {
            let results = join_all(batch.iter().map(|s| self.decide(s))).await;
            for (symbol, result) in batch.iter().zip(results) {
                match result {
                    Ok(decision) => decisions.push(decision),
                    Err(e @ EngineError::Validation(_)) => {
                        warn!(symbol = %symbol, error = %e, "Skipping symbol with invalid data")
                    }
                    Err(e) => error!(symbol = %symbol, error = %e, "Analysis failed"),
                }
            }
            if i + 1 < batches {
                tokio::time::sleep(Duration::from_millis(self.config.batch_delay_ms)).await;
            }
        }

        sort_by_confidence(&mut decisions);
        decisions
    }
}

/// Tradeable first, then by confidence, highest first
fn sort_by_confidence(decisions: &mut [ConfluenceDecision]) {
    decisions.sort_by(|a, b| {
        b.should_trade
            .cmp(&a.should_trade)
            .then(b.confidence.cmp(&a.confidence))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}

fn symbols_or_default(symbols: Vec<String>) -> Vec<String> {
    if symbols.is_empty() {
        DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect()
    } else {
        symbols.into_iter().map(|s| s.trim().to_uppercase()).collect()
    }
}

fn print_decision(d: &ConfluenceDecision) {
    let levels = match d.stop_price {
        Some(stop) => {
            let targets: Vec<String> = d.target_prices.iter().map(|t| format!("{:.6}", t)).collect();
            format!(" entry {:.6} stop {:.6} targets [{}]", d.entry_price, stop, targets.join(", "))
        }
        None => String::new(),
    };
    println!(
        "{:<12} {:<8} {:>3}%  {}{}",
        d.symbol,
        d.direction.to_string(),
        d.confidence,
        d.reason,
        levels
    );
    for w in &d.warnings {
        println!("{:<12} ! {}", "", w);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let config = SignalConfig::from_env();

    match cli.command {
        Commands::Analyze { symbol, decision } => cmd_analyze(config, symbol, decision).await?,
        Commands::Scan {
            symbols,
            decision,
            top_n,
            export,
        } => cmd_scan(config, symbols, decision, top_n, export).await?,
        Commands::Watch {
            symbols,
            decision,
            interval,
        } => cmd_watch(config, symbols, decision, interval).await?,
    }

    Ok(())
}

async fn cmd_analyze(config: SignalConfig, symbol: String, args: DecisionArgs) -> anyhow::Result<()> {
    let symbol = symbol.trim().to_uppercase();
    let mut scanner = Scanner::new(config, &args)?;
    scanner.load_models(std::slice::from_ref(&symbol));

    let decision = scanner.decide(&symbol).await?;
    match scanner.source.get_current_price(&symbol).await {
        Ok(price) => info!(symbol = %symbol, price, "Current price"),
        Err(e) => warn!(symbol = %symbol, error = %e, "Current price unavailable"),
    }
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(())
}

async fn cmd_scan(
    config: SignalConfig,
    symbols: Vec<String>,
    args: DecisionArgs,
    top_n: Option<usize>,
    export: Option<String>,
) -> anyhow::Result<()> {
    println!("\n=== Signal-Scan v{} ===", APP_VERSION);
    let symbols = symbols_or_default(symbols);
    let mut scanner = Scanner::new(config, &args)?;
    scanner.load_models(&symbols);

    println!("Symbols: {}", symbols.join(", "));
    println!(
        "Policy: {} | Timeframes: {} + [{}]\n",
        args.policy,
        scanner.timeframes.primary,
        scanner.timeframes.higher.join(", ")
    );

    let mut decisions = scanner.scan(&symbols).await;
    let tradeable = decisions.iter().filter(|d| d.should_trade).count();
    info!(scanned = symbols.len(), decided = decisions.len(), tradeable, "Scan complete");

    if let Some(n) = top_n {
        decisions.truncate(n);
    }
    for d in &decisions {
        print_decision(d);
    }

    if let Some(path) = export {
        std::fs::write(&path, serde_json::to_string_pretty(&decisions)?)?;
        println!("\nExported {} decisions to {}", decisions.len(), path);
    }
    Ok(())
}

async fn cmd_watch(
    config: SignalConfig,
    symbols: Vec<String>,
    args: DecisionArgs,
    interval: u64,
) -> anyhow::Result<()> {
    println!("\n=== Signal-Scan v{} (watch) ===", APP_VERSION);
    let symbols = symbols_or_default(symbols);
    let mut cooldown = SignalCooldown::new(config.cooldown_minutes);
    let mut scanner = Scanner::new(config, &args)?;
    scanner.load_models(&symbols);

    info!(
        symbols = symbols.len(),
        interval_secs = interval,
        cooldown_min = cooldown.window().num_minutes(),
        "Watching"
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, stopping watch");
                break;
            }
        }

        let now = Utc::now();
        cooldown.prune(now);
        for decision in scanner.scan(&symbols).await {
            if decision.should_trade && cooldown.try_emit(&decision.symbol, now) {
                print_decision(&decision);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{Direction, Probability};

    fn decision(symbol: &str, should_trade: bool, confidence: u8) -> ConfluenceDecision {
        ConfluenceDecision {
            symbol: symbol.to_string(),
            policy: "crossover_vote".to_string(),
            should_trade,
            direction: Direction::Long,
            confidence,
            reason: String::new(),
            warnings: Vec::new(),
            entry_price: 1.0,
            stop_price: None,
            target_prices: Vec::new(),
            probability: Probability::Unavailable,
            grade: None,
            timeframes: Vec::new(),
            missing_timeframes: Vec::new(),
        }
    }

    #[test]
    fn test_sort_puts_tradeable_and_confident_first() {
        let mut ds = vec![
            decision("AAA", false, 90),
            decision("BBB", true, 70),
            decision("CCC", true, 80),
        ];
        sort_by_confidence(&mut ds);
        let order: Vec<&str> = ds.iter().map(|d| d.symbol.as_str()).collect();
        assert_eq!(order, vec!["CCC", "BBB", "AAA"]);
    }

    #[test]
    fn test_symbols_normalized() {
        assert_eq!(symbols_or_default(vec![" btcusdt".to_string()]), vec!["BTCUSDT"]);
        assert_eq!(symbols_or_default(Vec::new()).len(), DEFAULT_SYMBOLS.len());
    }
}
