use anyhow::Result;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use taxi_bot::bot::{Envelope, FlowRouter, TelegramTransport, TelegramWebhookRegistrar};
use taxi_bot::config::AppConfig;
use taxi_bot::conversation_store::{ConversationStore, MemoryConversationStore, PgConversationStore};
use taxi_bot::db;
use taxi_bot::observability::{self, AdminState, WebhookRegistrar};
use taxi_bot::repository::{MemoryRepository, PgRepository, TaxiRepository};
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::{error, info, warn};

/// How often expired conversation rows are swept from Postgres
const PURGE_INTERVAL: Duration = Duration::from_secs(300);

struct Backends {
    repo: Arc<dyn TaxiRepository>,
    store: Arc<dyn ConversationStore>,
    pool: Option<Arc<PgPool>>,
}

async fn connect_backends(config: &AppConfig) -> Result<Backends> {
    let Some(url) = config.database.url.as_deref() else {
        warn!("DATABASE_URL is not set; users, trips and bookings are kept in memory and lost on restart");
        return Ok(Backends {
            repo: Arc::new(MemoryRepository::new()),
            store: Arc::new(MemoryConversationStore::new(config.conversation.ttl())),
            pool: None,
        });
    };

    info!("Initializing database connection");
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect(url)
        .await?;

    db::init_database_schema(&pool).await?;
    let pool = Arc::new(pool);

    let store = Arc::new(PgConversationStore::new(
        Arc::clone(&pool),
        config.conversation.ttl(),
    ));
    spawn_purge_task(Arc::clone(&store));

    Ok(Backends {
        repo: Arc::new(PgRepository::new(Arc::clone(&pool))),
        store,
        pool: Some(pool),
    })
}

fn spawn_purge_task(store: Arc<PgConversationStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged = purged, "Purged expired conversation states"),
                Err(e) => error!(error = %e, "Failed to purge expired conversation states"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file first
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    observability::init_tracing_with_config(&config.observability)?;
    config.validate()?;
    info!(config = %config.summary(), "Configuration loaded");

    let metrics = observability::init_metrics_with_config(&config.observability)?;
    let backends = connect_backends(&config).await?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.bot.http_timeout_secs))
        .build()?;
    let bot = Bot::with_client(config.bot.token.clone(), client);

    let me = bot.get_me().await?;
    let bot_username = Arc::new(me.username().to_string());
    info!(username = %bot_username, "Bot identity resolved");

    let router = Arc::new(FlowRouter::new(
        backends.repo,
        backends.store,
        config.conversation.clone(),
    ));
    let transport = TelegramTransport::new(bot.clone());

    let registrar = match config.bot.webhook_url.as_deref() {
        Some(url) => Some(Arc::new(TelegramWebhookRegistrar::new(bot.clone(), url)?)
            as Arc<dyn WebhookRegistrar>),
        None => None,
    };
    observability::start_admin_server(
        AdminState {
            metrics,
            db_pool: backends.pool,
            admin_secret: config.bot.admin_secret.clone(),
            registrar,
        },
        config.server.health_port,
    )
    .await?;

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint({
            let router = Arc::clone(&router);
            let transport = transport.clone();
            let bot_username = Arc::clone(&bot_username);
            move |msg: Message| {
                let router = Arc::clone(&router);
                let transport = transport.clone();
                let bot_username = Arc::clone(&bot_username);
                async move {
                    if let Some(envelope) = Envelope::from_message(&msg, &bot_username) {
                        let actions = router.handle(envelope).await;
                        transport.execute(actions).await;
                    }
                    respond(())
                }
            }
        }))
        .branch(Update::filter_callback_query().endpoint({
            let router = Arc::clone(&router);
            let transport = transport.clone();
            move |q: CallbackQuery| {
                let router = Arc::clone(&router);
                let transport = transport.clone();
                async move {
                    let actions = router.handle(Envelope::from_callback(&q)).await;
                    transport.execute(actions).await;
                    respond(())
                }
            }
        }));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .enable_ctrlc_handler()
        .build();

    match config.bot.webhook_url.as_deref() {
        Some(url) => {
            let addr = SocketAddr::from(([0, 0, 0, 0], config.bot.webhook_listen_port));
            let url = reqwest::Url::parse(url)?;
            info!(%addr, %url, "Starting dispatcher with webhook listener");
            let listener = webhooks::axum(bot, webhooks::Options::new(addr, url)).await?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            info!("Starting dispatcher with long polling");
            dispatcher.dispatch().await;
        }
    }

    Ok(())
}
