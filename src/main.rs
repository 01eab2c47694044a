//! Baby Tracker - shared activity timer server and command-line client
//!
//! This is the main entry point for the baby-tracker application.

use std::{future::Future, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;

use baby_tracker::{
    api::create_router,
    client::{ClientView, HttpBackend, TimerBackend, TimerStatus},
    config::{loop_config, Command, Config, RemoteArgs, ServeArgs},
    db::Database,
    error::AppResult,
    state::{ActivityType, AppState},
    tasks::{spawn_client, ClientHandle, LoopConfig},
    utils::{format::format_for_display, shutdown_signal},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("baby_tracker={},tower_http=info", config.log_level()))
        .init();

    match config.command {
        Command::Serve(args) => serve(args).await,
        Command::Watch {
            remote,
            poll_interval_secs,
        } => watch(&remote, loop_config(poll_interval_secs)).await,
        Command::Start {
            remote,
            activity,
            milk_amount,
        } => {
            let activity: ActivityType = activity.parse()?;
            let view = with_client(&remote, |client| async move {
                client.start(activity, milk_amount).await?;
                Ok(client.view())
            })
            .await?;
            print_view(&view);
            Ok(())
        }
        Command::Pause { remote } => {
            let view = with_client(&remote, |client| async move {
                client.pause().await?;
                Ok(client.view())
            })
            .await?;
            print_view(&view);
            Ok(())
        }
        Command::Resume { remote } => {
            let view = with_client(&remote, |client| async move {
                client.resume().await?;
                Ok(client.view())
            })
            .await?;
            print_view(&view);
            Ok(())
        }
        Command::Stop { remote } => {
            let id = with_client(&remote, |client| async move { client.stop().await }).await?;
            println!("Stopped, logged as activity #{}", id);
            Ok(())
        }
        Command::Nappy { remote, kind } => {
            let id =
                with_client(&remote, |client| async move { client.log_nappy(kind).await }).await?;
            println!("Nappy change ({}) logged as activity #{}", kind, id);
            Ok(())
        }
        Command::Status { remote } => {
            let view = with_client(&remote, |client| async move { Ok(client.view()) }).await?;
            print_view(&view);
            Ok(())
        }
        Command::History {
            remote,
            type_filter,
        } => history(&remote, type_filter).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    info!("Starting baby-tracker server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, db={}, max clock skew={}s",
        args.host,
        args.port,
        args.db.display(),
        args.max_clock_skew_secs
    );

    let db = Database::open(&args.db)?;
    let state = Arc::new(AppState::new(
        db,
        args.port,
        args.host.clone(),
        args.max_clock_skew(),
    ));

    // Create HTTP router with all endpoints
    let app = create_router(state);

    // Bind to the specified address
    let addr = args.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /api?action=active-timer - Read the shared timer");
    info!("  POST /api?action=active-timer - Set or clear the shared timer");
    info!("  GET  /api[?type=<type>]       - Activity history");
    info!("  POST /api                     - Log an activity");
    info!("  GET  /health                  - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Follow the shared timer, printing every change and running tick
async fn watch(remote: &RemoteArgs, config: LoopConfig) -> anyhow::Result<()> {
    let backend = Arc::new(HttpBackend::new(&remote.server));
    let (client, task) = spawn_client(backend, config);
    let mut views = client.subscribe();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                print_view(&view);
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    client.shutdown().await?;
    task.await?;
    Ok(())
}

/// Load the shared timer, run one action against it and flush before exiting
async fn with_client<F, Fut, T>(remote: &RemoteArgs, action: F) -> anyhow::Result<T>
where
    F: FnOnce(ClientHandle) -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let backend = Arc::new(HttpBackend::new(&remote.server));
    let (client, task) = spawn_client(backend, LoopConfig::default());

    let result = match client.sync().await {
        Ok(_) => action(client.clone()).await,
        Err(e) => Err(e),
    };

    // A rejected write only shows up once the pending writes are drained
    let flushed = client.shutdown().await;
    task.await?;
    let value = result?;
    flushed?;
    Ok(value)
}

async fn history(remote: &RemoteArgs, type_filter: Option<String>) -> anyhow::Result<()> {
    let backend = HttpBackend::new(&remote.server);
    let activities = backend.history(type_filter).await?;

    if activities.is_empty() {
        println!("No activities logged");
    }
    for activity in activities {
        match activity.type_tag.as_str() {
            "nappy" => println!(
                "{}  nappy change ({})",
                activity.time.unwrap_or_default(),
                activity.sub_type.unwrap_or_default()
            ),
            type_tag => {
                let label = type_tag
                    .parse::<ActivityType>()
                    .map(|activity| activity.label())
                    .unwrap_or(type_tag);
                let milk = activity
                    .milk_amount
                    .map(|ml| format!(", {} ml", ml))
                    .unwrap_or_default();
                println!(
                    "{}  {}: {} (paused {}){}",
                    activity.start_time.unwrap_or_default(),
                    label,
                    format_for_display(activity.duration.unwrap_or(0)),
                    format_for_display(activity.paused_time.unwrap_or(0)),
                    milk
                );
            }
        }
    }
    Ok(())
}

fn print_view(view: &ClientView) {
    match (view.status, view.activity) {
        (TimerStatus::Idle, _) | (_, None) => println!("No timer running"),
        (status, Some(activity)) => println!(
            "{} {} {}{}",
            activity.label(),
            view.display,
            if status == TimerStatus::Paused { "(paused)" } else { "" },
            view.milk_amount
                .map(|ml| format!(" {} ml", ml))
                .unwrap_or_default()
        ),
    }
}
