use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;
use tokio_util::sync::CancellationToken;

use telegen::cli::{Cli, Commands};
use telegen::scheduler::{start_scheduler, SchedulerDeps};
use telegen::telegram::dialogue::State;
use telegen::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TelegramNotifier};
use telegen::web::{run_webhook_server, WebhookState};
use telegencore::billing::{add_promo_code, Notifier, PaymentGateway};
use telegencore::core::{init_logger, log_startup_configuration};
use telegencore::fixtures::{cleanup_test_data, generate_test_data, TestDataOptions};
use telegencore::generation::default_generator;
use telegencore::seed::seed_tariffs;
use telegencore::storage::init_database;
use telegencore::{config, get_connection};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    let cli = Cli::parse_args();

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    init_logger(&config::LOG_FILE_PATH)?;

    let command = cli.command.unwrap_or(Commands::Run { webhook_port: None });
    match &command {
        Commands::Run { webhook_port } => run_bot(*webhook_port).await,
        Commands::SeedTariffs { clear } => run_seed_tariffs(*clear),
        Commands::GenerateTestData { cleanup, .. } => {
            let options = command
                .test_data_options()
                .ok_or_else(|| anyhow::anyhow!("generate-test-data options missing"))?;
            run_generate_test_data(&options, *cleanup)
        }
        Commands::CleanupTestData { all_users } => run_cleanup_test_data(*all_users),
        Commands::CreatePromoCode { code, tariff, months } => {
            let pool = init_database(&config::DATABASE_PATH)?;
            let conn = get_connection(&pool)?;
            let promo = add_promo_code(&conn, code, *tariff, *months)?;
            println!("🎟 Promo code {} grants {} for {} month(s)", promo.code, tariff, months);
            Ok(())
        }
        Commands::Migrate => {
            init_database(&config::DATABASE_PATH)?;
            println!("✅ Migrations applied to {}", *config::DATABASE_PATH);
            Ok(())
        }
    }
}

fn run_seed_tariffs(clear: bool) -> Result<()> {
    let pool = init_database(&config::DATABASE_PATH)?;
    let conn = get_connection(&pool)?;
    let report = seed_tariffs(&conn, clear)?;

    if clear {
        println!("🗑  Removed {} tariff(s)", report.cleared);
    }
    for code in &report.tariffs_created {
        println!("➕ Created tariff {}", code);
    }
    for code in &report.tariffs_updated {
        println!("♻️  Updated tariff {}", code);
    }
    println!("✅ Tariffs seeded, {} new period(s)", report.periods_created);
    Ok(())
}

fn run_generate_test_data(options: &TestDataOptions, cleanup: bool) -> Result<()> {
    let pool = init_database(&config::DATABASE_PATH)?;
    let conn = get_connection(&pool)?;

    if cleanup {
        let removed = cleanup_test_data(&conn, false)?;
        println!("🗑  Removed {} test user(s)", removed);
    }

    let report = generate_test_data(&conn, options)?;
    println!(
        "✅ Generated {} users, {} channels, {} flows, {} sources",
        report.users, report.channels, report.flows, report.sources
    );
    Ok(())
}

fn run_cleanup_test_data(all_users: bool) -> Result<()> {
    let pool = init_database(&config::DATABASE_PATH)?;
    let conn = get_connection(&pool)?;
    let removed = cleanup_test_data(&conn, all_users)?;
    if all_users {
        println!("🗑  Removed all {} user(s)", removed);
    } else {
        println!("🗑  Removed {} test user(s)", removed);
    }
    Ok(())
}

/// Runs the bot with polling, the background scheduler and the webhook server
async fn run_bot(webhook_port: Option<u16>) -> Result<()> {
    log_startup_configuration();

    let db_pool = Arc::new(init_database(&config::DATABASE_PATH)?);
    let bot = create_bot()?;

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let generator = default_generator(Arc::clone(&db_pool))?;
    let gateway = Arc::new(PaymentGateway::from_env()?);
    let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(bot.clone()));

    let shutdown = CancellationToken::new();
    let scheduler = start_scheduler(
        SchedulerDeps {
            bot: bot.clone(),
            pool: Arc::clone(&db_pool),
            generator: generator.clone(),
            notifier: Arc::clone(&notifier),
        },
        shutdown.clone(),
    );

    let port = webhook_port.unwrap_or(*config::web::WEB_PORT);
    let webhook_state = WebhookState::new(Arc::clone(&db_pool), Arc::clone(&notifier), &gateway);
    tokio::spawn(async move {
        if let Err(e) = run_webhook_server(port, webhook_state).await {
            log::error!("Webhook server error: {}", e);
        }
    });

    let deps = HandlerDeps::new(db_pool, generator, gateway);
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    log::info!("🤖 Bot started, polling for updates");
    Dispatcher::builder(bot, schema(deps))
        .dependencies(dptree::deps![InMemStorage::<State>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    shutdown.cancel();
    if let Err(e) = scheduler.await {
        log::warn!("Scheduler task ended abnormally: {}", e);
    }
    Ok(())
}
