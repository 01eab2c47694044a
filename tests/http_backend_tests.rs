mod common;

use std::sync::Arc;

use baby_tracker::{
    client::{HttpBackend, Reconciled, TimerBackend, TimerStatus},
    create_router,
    error::AppError,
    state::{ActivityEntry, ActivityType, AppState, NappyKind, TimerState},
    tasks::spawn_client,
    utils::time,
};
use chrono::TimeDelta;
use tokio::net::TcpListener;

/// Serve a fresh in-memory state on an ephemeral port
async fn spawn_server() -> (Arc<AppState>, String) {
    let state = common::memory_state();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(Arc::clone(&state));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (state, format!("http://{}", addr))
}

#[tokio::test]
async fn timer_slot_over_http() {
    let (state, server) = spawn_server().await;
    let backend = HttpBackend::new(&server);

    assert_eq!(backend.get_active().await.unwrap(), None);

    let timer = TimerState::new(
        ActivityType::Bottlefeeding,
        time::now() - TimeDelta::seconds(45),
        Some(90),
    )
    .paused(time::now());
    backend.set_active(timer.clone()).await.unwrap();

    assert_eq!(backend.get_active().await.unwrap(), Some(timer.clone()));
    assert_eq!(state.timer_store.get_active().unwrap(), Some(timer));

    backend.clear_active().await.unwrap();
    backend.clear_active().await.unwrap();
    assert_eq!(backend.get_active().await.unwrap(), None);
}

#[tokio::test]
async fn rejected_write_surfaces_as_validation() {
    let (state, server) = spawn_server().await;
    let backend = HttpBackend::new(&server);

    let future = TimerState::new(
        ActivityType::Sleeping,
        time::now() + TimeDelta::minutes(10),
        None,
    );
    let err = backend.set_active(future).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)), "got {:?}", err);
    assert_eq!(state.timer_store.get_active().unwrap(), None);

    let err = backend.history(Some(String::new())).await.unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn activities_over_http() {
    let (_state, server) = spawn_server().await;
    let backend = HttpBackend::new(&server);

    let finished = TimerState::new(
        ActivityType::Breastfeeding,
        time::now() - TimeDelta::minutes(20),
        None,
    )
    .finish(time::now());
    let feed_id = backend
        .append_activity(ActivityEntry::Timed(finished))
        .await
        .unwrap();
    let nappy_id = backend
        .append_activity(ActivityEntry::Nappy {
            kind: NappyKind::Wet,
            time: time::now(),
        })
        .await
        .unwrap();
    assert!(nappy_id > feed_id);

    let all = backend.history(None).await.unwrap();
    assert_eq!(all.len(), 2);

    let feeds = backend
        .history(Some("breastfeeding".to_string()))
        .await
        .unwrap();
    assert_eq!(feeds.len(), 1);
    assert_eq!(feeds[0].id, Some(feed_id));
    assert_eq!(feeds[0].duration, Some(20 * 60 * 1000));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{}/", addr));
    assert!(matches!(
        backend.get_active().await,
        Err(AppError::Network(_))
    ));
}

#[tokio::test]
async fn two_clients_share_a_timer_over_http() {
    let (state, server) = spawn_server().await;
    let (tab_a, _) = spawn_client(Arc::new(HttpBackend::new(&server)), common::manual_sync());
    let (tab_b, _) = spawn_client(Arc::new(HttpBackend::new(&server)), common::manual_sync());
    tab_a.sync().await.unwrap();
    tab_b.sync().await.unwrap();

    tab_a.start(ActivityType::Sleeping, None).await.unwrap();
    tab_a.flush().await.unwrap();
    assert_eq!(tab_b.sync().await.unwrap(), Reconciled::Restored);
    assert_eq!(tab_b.view().started_at, tab_a.view().started_at);

    tab_b.pause().await.unwrap();
    tab_b.flush().await.unwrap();
    assert_eq!(tab_a.sync().await.unwrap(), Reconciled::Replaced);
    assert_eq!(tab_a.view().status, TimerStatus::Paused);

    tab_a.stop().await.unwrap();
    assert_eq!(tab_b.sync().await.unwrap(), Reconciled::Cleared);
    assert_eq!(tab_b.view().status, TimerStatus::Idle);

    let logged = state.activity_log.latest_of_type("sleeping").unwrap();
    assert_eq!(logged.len(), 1);
}
