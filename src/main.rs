use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ladder::cli::{self, Cli, OutputMode};
use ladder::config::{BotConfig, LoggingConfig, Settings, TradeType};
use ladder::coordination::{install_signal_handlers, ShutdownController, ShutdownMode};
use ladder::domain::DashboardSnapshot;
use ladder::error::{LadderError, Result};
use ladder::exchange::{build_client, ExchangeClient};
use ladder::strategy::{feeds, grid, recover_state, Engine, EngineChannels};
use ladder::tui;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ladder: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.bot_config();
    let settings = Settings::load()?;

    // --plan never trades, so it logs to stdout like headless mode.
    let tui_active = !cli.headless && !cli.plan;
    let _log_guard = init_logging(&settings.logging, tui_active);

    if let Err(errors) = config.validate() {
        return Err(LadderError::Validation(errors.join("; ")));
    }
    grid::validate(&config)?;

    let client = build_client(&config, settings.api.as_ref())?;
    let fee_rate = client.market_meta().effective_fee_rate(config.fee_rate);

    if cli.plan {
        let start_price = match config.trigger_price {
            Some(price) => price,
            None => client.fetch_ticker().await?.last,
        };
        return cli::print_plan(
            &config,
            start_price,
            fee_rate,
            OutputMode::from_json_flag(cli.json),
        );
    }

    info!(
        "Starting ladder: {} on {} ({}), fee rate {}",
        config.symbol,
        config.exchange_id,
        if config.paper { "paper" } else { "live" },
        fee_rate
    );

    if config.trade_type == TradeType::Futures {
        if let Err(e) = client
            .set_leverage(config.leverage, config.margin_mode)
            .await
        {
            warn!("Failed to set leverage: {}", e);
        }
    }

    let controller = Arc::new(ShutdownController::new());
    install_signal_handlers(Arc::clone(&controller));

    // Orders can rest on the book from here on, so every exit path runs
    // the exit guard: an exit nobody requested escalates to an emergency
    // sweep of this bot's orders.
    let outcome = trade(&config, &client, &controller, fee_rate, tui_active).await;
    controller.finalize_exit(client.as_ref()).await;
    if outcome.is_ok() {
        info!("Shutdown complete");
    }
    outcome
}

async fn trade(
    config: &BotConfig,
    client: &Arc<dyn ExchangeClient>,
    controller: &Arc<ShutdownController>,
    fee_rate: Decimal,
    tui_active: bool,
) -> Result<()> {
    // A fatal ledger-vs-venue divergence halts before any trading; the
    // exit guard still sweeps this bot's leftover orders on the way out.
    let recovered = match recover_state(client.as_ref(), config, fee_rate).await {
        Ok(recovered) => recovered,
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };

    if recovered.is_none() {
        let start_price = match config.trigger_price {
            Some(price) => price,
            None => client.fetch_ticker().await?.last,
        };
        if !cli::confirm_trade_plan(config, start_price, fee_rate).await? {
            info!("Run not confirmed; exiting");
            return Ok(());
        }
    }

    let (snapshot_tx, snapshot_rx) = watch::channel(DashboardSnapshot::initial(
        &config.symbol,
        &config.exchange_id,
        config.paper,
        config.max_safety_orders,
    ));

    let mut engine = Engine::new(
        config.clone(),
        Arc::clone(client),
        Arc::clone(controller),
        snapshot_tx,
        fee_rate,
    );
    if let Some(round) = recovered {
        engine.adopt_round(round).await;
    }

    let (ticks, fills, _feed_handles) = feeds::spawn(Arc::clone(client), controller);
    let engine_handle = tokio::spawn(engine.run(EngineChannels { ticks, fills }));

    if tui_active {
        if let Err(e) = tui::run_dashboard(snapshot_rx, Arc::clone(controller)).await {
            warn!("Dashboard error: {}", e);
            // Without a dashboard there is no quit key; stop the engine too.
            controller.request(ShutdownMode::Graceful);
        }
    } else {
        drop(snapshot_rx);
    }

    match engine_handle.await {
        Ok(result) => result,
        Err(e) => Err(LadderError::Internal(format!("engine task failed: {e}"))),
    }
}

fn init_logging(
    logging: &LoggingConfig,
    tui_active: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("info,ladder={}", logging.level)));

    if tui_active {
        // The dashboard owns the terminal; logs go to a file instead.
        let appender = tracing_appender::rolling::never(".", &logging.file);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .with_target(true)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
        None
    }
}
