mod routes;
mod scheduler;
mod trigger;

use std::env;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::routes::{router, AppState};
use crate::scheduler::run_scheduler;
use crate::trigger::{EnvTrigger, SnapshotTrigger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    // enable logging to console
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "server=debug,indexer=info,database=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr: SocketAddr = env::var("LISTEN_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;
    let interval_secs: u64 = match env::var("SNAPSHOT_INTERVAL_SECS") {
        Ok(value) => value.parse()?,
        Err(_) => 0,
    };

    // configuration is read again on every trigger
    let trigger: Arc<dyn SnapshotTrigger> = Arc::new(EnvTrigger);
    let app = router(AppState {
        trigger: trigger.clone(),
    });

    // create joinset for all tasks
    let mut set = JoinSet::new();

    if interval_secs > 0 {
        tracing::info!(
            "scheduling gauge history snapshots every {}s",
            interval_secs
        );
        set.spawn(run_scheduler(trigger, Duration::from_secs(interval_secs)));
    }

    // run the server
    set.spawn(async move {
        tracing::info!("listening on {}", addr);

        if let Err(axum_error) = axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .await
        {
            tracing::error!("web server shut down: {}", axum_error);
        }
    });

    // wait for all tasks to complete
    while let Some(res) = set.join_next().await {
        res?;
    }

    tracing::info!("server shutting down after all tasks finished");

    Ok(())
}
