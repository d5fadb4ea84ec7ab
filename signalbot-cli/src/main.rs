//! Signalbot CLI: drive the bot against the simulated market.
//!
//! Commands:
//! - `run`: connect, start the bot on its cadence and print events until Ctrl-C
//! - `analyze`: one-shot signal on freshly simulated history
//! - `init-config`: write a default TOML config file

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use signalbot_core::domain::{Action, TradeHistoryRecord};
use signalbot_core::market::{Bridge, MarketSimulator};
use signalbot_core::model::DecisionModel;
use signalbot_core::SignalComposer;
use signalbot_runner::{
    history_to_json, AppConfig, BotController, BotEvent, HistorySummary, ModelConfig, TradingBot,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "signalbot",
    about = "Signalbot CLI: adaptive signal bot on a simulated market"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot until Ctrl-C (or for a fixed duration).
    Run {
        /// Path to a TOML config file. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Stop after this many seconds instead of waiting for Ctrl-C.
        #[arg(long)]
        duration_secs: Option<u64>,

        /// Close every open position before exiting.
        #[arg(long, default_value_t = false)]
        close_on_exit: bool,

        /// Write the trade history as JSON to this file on exit.
        #[arg(long)]
        history_out: Option<PathBuf>,
    },
    /// Print one signal for freshly simulated history.
    Analyze {
        /// Path to a TOML config file. Defaults are used when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Symbol to analyze. Defaults to the configured bot symbol.
        #[arg(long)]
        symbol: Option<String>,

        /// Candles to analyze.
        #[arg(long, default_value_t = 100)]
        bars: usize,
    },
    /// Write a default config file.
    InitConfig {
        #[arg(long, default_value = "signalbot.toml")]
        output: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            duration_secs,
            close_on_exit,
            history_out,
        } => {
            run_bot(
                config.as_deref(),
                duration_secs,
                close_on_exit,
                history_out.as_deref(),
            )
            .await
        }
        Commands::Analyze {
            config,
            symbol,
            bars,
        } => run_analyze(config.as_deref(), symbol, bars),
        Commands::InitConfig { output, force } => run_init_config(&output, force),
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(AppConfig::demo()),
    }
}

fn load_model(config: &ModelConfig) -> Result<Arc<DecisionModel>> {
    match &config.weights_path {
        Some(path) if path.exists() => {
            info!("loading model weights from {}", path.display());
            let model = DecisionModel::load(path)
                .with_context(|| format!("loading model weights {}", path.display()))?;
            Ok(Arc::new(model))
        }
        _ => Ok(Arc::new(DecisionModel::new(config.seed))),
    }
}

fn describe(event: &BotEvent) -> String {
    match event {
        BotEvent::StatusChanged(status) => format!("status   {status}"),
        BotEvent::AnalysisComplete(signal) => format!(
            "signal   {} {:.1}% lot {:.2} sl {:.5} tp {:.5} ({})",
            signal.action,
            signal.confidence,
            signal.lot_size,
            signal.stop_loss,
            signal.take_profit,
            signal.reasoning
        ),
        BotEvent::TradeExecuted(record) => describe_trade(record),
    }
}

fn describe_trade(record: &TradeHistoryRecord) -> String {
    let profit = record
        .profit
        .map(|p| format!(" profit {p:+.2}"))
        .unwrap_or_default();
    format!(
        "trade    #{} {:?} {} {} {:.2} @ {:.5}{profit} ({})",
        record.id, record.action, record.ticket, record.symbol, record.volume, record.price, record.reasoning
    )
}

async fn run_bot(
    config_path: Option<&Path>,
    duration_secs: Option<u64>,
    close_on_exit: bool,
    history_out: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let model = load_model(&config.model)?;
    let bridge = MarketSimulator::new(config.simulator.clone());
    let bot = TradingBot::new(config.bot.clone(), bridge, Arc::clone(&model));
    let mut controller = BotController::new(bot);

    let events = controller.subscribe();
    std::thread::spawn(move || {
        for event in events {
            println!("{}", describe(&event));
        }
    });

    controller
        .connect(&config.credentials)
        .await
        .context("connecting to simulated market")?;
    controller.start().await?;
    info!(
        "trading {} every {} ms (Ctrl-C to stop)",
        config.bot.symbol, config.bot.analysis_interval_ms
    );

    match duration_secs {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => tokio::signal::ctrl_c().await?,
    }

    controller.stop().await;
    if close_on_exit {
        let closed = controller.close_all_positions().await?;
        info!("closed {} position(s) on exit", closed.len());
    }

    let history = controller.history().await;
    if let Ok(account) = controller.bot().lock().await.account() {
        println!(
            "account  balance {:.2} equity {:.2} margin {:.2} free {:.2}",
            account.balance, account.equity, account.margin, account.free_margin
        );
    }
    controller.shutdown().await;

    let summary = HistorySummary::from_records(&history);
    println!(
        "summary  {} opened, {} closed, {} wins, {} losses, pnl {:+.2}, win rate {:.0}%",
        summary.opened,
        summary.closed,
        summary.wins,
        summary.losses,
        summary.realized_pnl,
        summary.win_rate * 100.0
    );

    if let Some(path) = history_out {
        let json = history_to_json(&history)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        info!("wrote trade history to {}", path.display());
    }

    if let Some(path) = &config.model.weights_path {
        model
            .save(path)
            .with_context(|| format!("saving model weights {}", path.display()))?;
        info!("saved model weights to {}", path.display());
    }

    Ok(())
}

fn run_analyze(config_path: Option<&Path>, symbol: Option<String>, bars: usize) -> Result<()> {
    let config = load_config(config_path)?;
    let symbol = symbol.unwrap_or_else(|| config.bot.symbol.clone());
    let model = load_model(&config.model)?;

    let mut bridge = MarketSimulator::new(config.simulator.clone());
    bridge
        .connect(&config.credentials)
        .context("connecting to simulated market")?;
    let candles = bridge.market_data(&symbol, bars)?;

    let analysis = SignalComposer::new(model).analyze(&candles)?;
    println!("{symbol} @ {:.5} over {} candles", analysis.price, candles.len());
    if let Some(probs) = analysis.probabilities {
        println!(
            "p(BUY) {:.3}  p(SELL) {:.3}  p(HOLD) {:.3}",
            probs.get(Action::Buy),
            probs.get(Action::Sell),
            probs.get(Action::Hold)
        );
    }
    println!("{}", serde_json::to_string_pretty(&analysis.signal)?);
    Ok(())
}

fn run_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }
    AppConfig::demo().save(output)?;
    println!("wrote {}", output.display());
    Ok(())
}
