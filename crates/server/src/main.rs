//! relgraph server entry point.
//!
//! Wires the follow-relationship engine to `PostgreSQL` and Redis and runs
//! the outbox and delivery workers until a shutdown signal arrives.

use std::sync::Arc;

use apalis::prelude::*;
use apalis_redis::RedisStorage;
use relgraph_common::{Config, telemetry::init_tracing};
use relgraph_core::{
    BlockingService, CounterSinkService, DbIdentityResolver, DbRelationshipStore, DeliveryService,
    EventSinkService, FollowingDeps, FollowingService, FollowingSettings, InstanceStatsSink,
    NoOpDelivery, Outbox, OutboxWorker,
};
use relgraph_db::repositories::{
    BlockingRepository, FollowRequestRepository, FollowingRepository, InstanceRepository,
    UserRepository,
};
use relgraph_queue::workers::{DeliverContext, deliver_worker};
use relgraph_queue::{
    DEFAULT_QUEUE, DeliverJob, HIGH_PRIORITY_QUEUE, RedisDeliveryService, RedisEventSink,
    RedisPubSub,
};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn deliver_storage(
    conn: redis::aio::ConnectionManager,
    namespace: &str,
) -> RedisStorage<DeliverJob> {
    RedisStorage::new_with_config(conn, apalis_redis::Config::default().set_namespace(namespace))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()?;
    init_tracing(&config.logging)?;

    info!("Starting relgraph...");

    // Connect to database
    let db = Arc::new(relgraph_db::init(&config).await?);
    info!("Connected to database");

    info!("Running database migrations...");
    relgraph_db::migrate(&db).await?;
    info!("Migrations completed");

    // Connect to Redis and initialize job queues
    info!("Connecting to Redis...");
    let redis_client = redis::Client::open(config.redis.url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    let high_priority = deliver_storage(redis_conn.clone(), HIGH_PRIORITY_QUEUE);
    let normal = deliver_storage(redis_conn, DEFAULT_QUEUE);
    info!("Connected to Redis job queue");

    let pubsub = Arc::new(RedisPubSub::new(&config.redis.url, &config.redis.prefix).await?);
    pubsub.start().await?;

    // Initialize repositories
    let user_repo = UserRepository::new(Arc::clone(&db));
    let following_repo = FollowingRepository::new(Arc::clone(&db));
    let follow_request_repo = FollowRequestRepository::new(Arc::clone(&db));
    let blocking_repo = BlockingRepository::new(Arc::clone(&db));
    let instance_repo = InstanceRepository::new(Arc::clone(&db));

    // Outbound collaborators
    let delivery: DeliveryService = if config.federation.enabled {
        Arc::new(RedisDeliveryService::new(
            high_priority.clone(),
            normal.clone(),
        ))
    } else {
        Arc::new(NoOpDelivery)
    };
    let events: EventSinkService = Arc::new(RedisEventSink::new(Arc::clone(&pubsub)));
    let counters: CounterSinkService = Arc::new(InstanceStatsSink::new(instance_repo));

    let (outbox, outbox_rx) = Outbox::channel();
    let following = FollowingService::new(FollowingDeps {
        store: Arc::new(DbRelationshipStore::new(
            following_repo,
            follow_request_repo,
            user_repo.clone(),
        )),
        blocking: Arc::new(BlockingService::new(blocking_repo)),
        identity: Arc::new(DbIdentityResolver::new(user_repo, config.server.url.clone())),
        outbox,
        settings: FollowingSettings::from_config(&config),
    });

    let (outbox_stop, outbox_stopped) = oneshot::channel::<()>();
    let outbox_worker = tokio::spawn(
        OutboxWorker::new(outbox_rx, delivery, events, counters).run_until(async move {
            let _ = outbox_stopped.await;
        }),
    );
    info!("Outbox worker started");

    // Keep the followings cache coherent with edges written elsewhere
    let mut internal_rx = pubsub.subscribe_internal();
    let cache_owner = following.clone();
    tokio::spawn(async move {
        loop {
            match internal_rx.recv().await {
                Ok(event) => cache_owner.handle_internal_event(&event).await,
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Internal event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    // Start ActivityPub delivery workers if federation is enabled
    if config.federation.enabled {
        info!("Starting ActivityPub delivery workers...");
        let user_agent = format!("relgraph/{}", env!("CARGO_PKG_VERSION"));
        let deliver_ctx = DeliverContext::new(user_agent)?;

        tokio::spawn(async move {
            let monitor = Monitor::new()
                .register(
                    WorkerBuilder::new("deliver-high")
                        .data(deliver_ctx.clone())
                        .backend(high_priority)
                        .build_fn(deliver_worker),
                )
                .register(
                    WorkerBuilder::new("deliver")
                        .data(deliver_ctx)
                        .backend(normal)
                        .build_fn(deliver_worker),
                );

            if let Err(e) = monitor.run().await {
                error!(error = %e, "Delivery workers failed");
            }
        });
        info!("ActivityPub delivery workers started");
    }

    shutdown_signal().await;

    // Flush pending deliveries and events before closing Redis
    let _ = outbox_stop.send(());
    if let Err(e) = outbox_worker.await {
        error!(error = %e, "Outbox worker panicked");
    }

    if let Err(e) = pubsub.shutdown().await {
        warn!(error = %e, "Failed to close Redis Pub/Sub cleanly");
    }

    info!("Shutdown complete");
    Ok(())
}
