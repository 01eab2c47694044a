//! Client runtime: display tick, polling and command handling
//!
//! One task owns the [`TimerClient`] and runs every callback to completion
//! before the next, so the tick, the poll and user commands never observe
//! each other half-applied. Network calls run in an in-flight set and report
//! back as completions. Slot writes go out one at a time in the order they
//! were made; while one is on the wire only the newest pending snapshot is
//! kept.

use std::{sync::Arc, time::Duration};

use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

use crate::{
    client::{
        ClientView, PendingWrite, PollTicket, Reconciled, TimerBackend, TimerClient, WriteAck,
    },
    error::{AppError, AppResult},
    state::{ActivityEntry, ActivityType, NappyKind, TimerState},
    utils::time,
};

/// Timing of the client runtime
#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub poll_interval: Duration,
    pub tick_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
        }
    }
}

enum ClientCommand {
    Start {
        activity: ActivityType,
        milk_amount: Option<u32>,
        reply: oneshot::Sender<AppResult<()>>,
    },
    Pause {
        reply: oneshot::Sender<AppResult<()>>,
    },
    Resume {
        reply: oneshot::Sender<AppResult<()>>,
    },
    Stop {
        reply: oneshot::Sender<AppResult<i64>>,
    },
    LogNappy {
        kind: NappyKind,
        reply: oneshot::Sender<AppResult<i64>>,
    },
    Sync {
        reply: oneshot::Sender<AppResult<Reconciled>>,
    },
    Flush {
        reply: oneshot::Sender<AppResult<()>>,
    },
    Shutdown {
        reply: oneshot::Sender<AppResult<()>>,
    },
}

enum Completion {
    Write {
        revision: u64,
        result: AppResult<()>,
    },
    Poll {
        ticket: PollTicket,
        result: AppResult<Option<TimerState>>,
        reply: Option<oneshot::Sender<AppResult<Reconciled>>>,
    },
}

/// Cloneable handle to a running client
#[derive(Debug, Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<ClientCommand>,
    view_rx: watch::Receiver<ClientView>,
}

impl ClientHandle {
    /// Start a timer. Returns once applied locally; the write completes in the background.
    pub async fn start(&self, activity: ActivityType, milk_amount: Option<u32>) -> AppResult<()> {
        self.request(|reply| ClientCommand::Start {
            activity,
            milk_amount,
            reply,
        })
        .await
    }

    pub async fn pause(&self) -> AppResult<()> {
        self.request(|reply| ClientCommand::Pause { reply }).await
    }

    pub async fn resume(&self) -> AppResult<()> {
        self.request(|reply| ClientCommand::Resume { reply }).await
    }

    /// Stop the timer and log it, returning the new activity id
    pub async fn stop(&self) -> AppResult<i64> {
        self.request(|reply| ClientCommand::Stop { reply }).await
    }

    pub async fn log_nappy(&self, kind: NappyKind) -> AppResult<i64> {
        self.request(|reply| ClientCommand::LogNappy { kind, reply }).await
    }

    /// Settle pending writes, then poll immediately
    pub async fn sync(&self) -> AppResult<Reconciled> {
        self.request(|reply| ClientCommand::Sync { reply }).await
    }

    /// Wait until every pending write has been answered. Fails with the
    /// error of the last write if the server never accepted it.
    pub async fn flush(&self) -> AppResult<()> {
        self.request(|reply| ClientCommand::Flush { reply }).await
    }

    /// Flush pending writes and end the runtime, reporting a lost write like [`flush`](Self::flush)
    pub async fn shutdown(&self) -> AppResult<()> {
        self.request(|reply| ClientCommand::Shutdown { reply }).await
    }

    /// Latest published view
    pub fn view(&self) -> ClientView {
        self.view_rx.borrow().clone()
    }

    /// Receiver that wakes on every published view
    pub fn subscribe(&self) -> watch::Receiver<ClientView> {
        self.view_rx.clone()
    }

    async fn request<T, F>(&self, build: F) -> AppResult<T>
    where
        F: FnOnce(oneshot::Sender<AppResult<T>>) -> ClientCommand,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| AppError::ClientClosed)?;
        reply_rx.await.map_err(|_| AppError::ClientClosed)?
    }
}

impl std::fmt::Debug for ClientCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ClientCommand::Start { .. } => "Start",
            ClientCommand::Pause { .. } => "Pause",
            ClientCommand::Resume { .. } => "Resume",
            ClientCommand::Stop { .. } => "Stop",
            ClientCommand::LogNappy { .. } => "LogNappy",
            ClientCommand::Sync { .. } => "Sync",
            ClientCommand::Flush { .. } => "Flush",
            ClientCommand::Shutdown { .. } => "Shutdown",
        };
        f.write_str(name)
    }
}

/// Spawn a client runtime on the current tokio runtime
pub fn spawn_client<B: TimerBackend>(
    backend: Arc<B>,
    config: LoopConfig,
) -> (ClientHandle, JoinHandle<()>) {
    let (command_tx, command_rx) = mpsc::channel(32);
    let (view_tx, view_rx) = watch::channel(ClientView::default());

    let runtime = ReconciliationLoop {
        client: TimerClient::new(),
        backend,
        config,
        commands: command_rx,
        view_tx,
        in_flight: FuturesUnordered::new(),
        polls_in_flight: 0,
        writing: false,
        queued_write: None,
        write_error: None,
    };
    let task = tokio::spawn(runtime.run());

    (
        ClientHandle {
            commands: command_tx,
            view_rx,
        },
        task,
    )
}

pub struct ReconciliationLoop<B> {
    client: TimerClient,
    backend: Arc<B>,
    config: LoopConfig,
    commands: mpsc::Receiver<ClientCommand>,
    view_tx: watch::Sender<ClientView>,
    in_flight: FuturesUnordered<BoxFuture<'static, Completion>>,
    polls_in_flight: usize,
    /// A `set_active` is on the wire
    writing: bool,
    queued_write: Option<PendingWrite>,
    /// Failure of the latest write not yet reported through flush or shutdown
    write_error: Option<AppError>,
}

impl<B: TimerBackend> ReconciliationLoop<B> {
    async fn run(mut self) {
        info!(
            "Starting timer client (poll every {:?})",
            self.config.poll_interval
        );

        let mut tick = interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first poll fires immediately and doubles as the initial load
        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Shutdown { reply }) => {
                        self.drain_writes().await;
                        let _ = reply.send(self.take_write_error());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        self.drain_writes().await;
                        if let Err(e) = self.take_write_error() {
                            warn!("Timer client closed with an unsaved change: {}", e);
                        }
                        break;
                    }
                },
                _ = tick.tick() => self.on_tick(),
                _ = poll.tick() => self.issue_poll(None),
                Some(done) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.on_completion(done);
                }
            }
        }

        info!("Timer client stopped");
    }

    async fn handle_command(&mut self, command: ClientCommand) {
        debug!("Handling {:?}", command);
        match command {
            ClientCommand::Start {
                activity,
                milk_amount,
                reply,
            } => {
                let result = self.client.start(activity, milk_amount, time::now());
                let _ = reply.send(self.persist(result));
            }
            ClientCommand::Pause { reply } => {
                let result = self.client.pause(time::now());
                let _ = reply.send(self.persist(result));
            }
            ClientCommand::Resume { reply } => {
                let result = self.client.resume(time::now());
                let _ = reply.send(self.persist(result));
            }
            ClientCommand::Stop { reply } => {
                let result = self.stop().await;
                let _ = reply.send(result);
            }
            ClientCommand::LogNappy { kind, reply } => {
                let entry = ActivityEntry::Nappy {
                    kind,
                    time: time::now(),
                };
                let result = self.backend.append_activity(entry).await;
                if let Err(e) = &result {
                    warn!("Failed to log nappy change: {}", e);
                }
                let _ = reply.send(result);
            }
            ClientCommand::Sync { reply } => {
                self.drain_writes().await;
                self.issue_poll(Some(reply));
            }
            ClientCommand::Flush { reply } => {
                self.drain_writes().await;
                let _ = reply.send(self.take_write_error());
            }
            ClientCommand::Shutdown { reply } => {
                // Handled by the loop itself
                let _ = reply.send(Ok(()));
            }
        }
    }

    /// Publish a locally applied change and queue its write
    fn persist(&mut self, pending: AppResult<PendingWrite>) -> AppResult<()> {
        let pending = pending?;
        self.publish();

        if self.writing {
            if let Some(older) = self.queued_write.replace(pending) {
                self.client.supersede_write(older.revision);
            }
        } else {
            self.send_write(pending);
        }
        Ok(())
    }

    fn send_write(&mut self, pending: PendingWrite) {
        let PendingWrite { revision, snapshot } = pending;
        self.writing = true;

        let backend = Arc::clone(&self.backend);
        self.in_flight.push(
            async move {
                let result = backend.set_active(snapshot).await;
                Completion::Write { revision, result }
            }
            .boxed(),
        );
    }

    fn take_write_error(&mut self) -> AppResult<()> {
        match self.write_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Clear the slot, then log the finished run.
    ///
    /// Earlier writes are drained first so none of them can land on the
    /// server after the clear and resurrect the timer.
    async fn stop(&mut self) -> AppResult<i64> {
        let plan = self.client.begin_stop(time::now())?;
        self.drain_writes().await;

        if let Err(e) = self.backend.clear_active().await {
            warn!("Failed to clear the shared timer, keeping it running: {}", e);
            self.client.abort_stop();
            return Err(e);
        }
        self.client.complete_stop();
        self.publish();

        match self.backend.append_activity(plan.entry).await {
            Ok(id) => {
                info!("Logged finished activity #{}", id);
                Ok(id)
            }
            Err(e) => {
                error!("Timer was cleared but the activity could not be saved: {}", e);
                Err(AppError::ActivityNotSaved(Box::new(e)))
            }
        }
    }

    fn issue_poll(&mut self, reply: Option<oneshot::Sender<AppResult<Reconciled>>>) {
        if reply.is_none() && self.polls_in_flight > 0 {
            debug!("Previous poll still in flight, skipping this one");
            return;
        }

        self.polls_in_flight += 1;
        let ticket = self.client.begin_poll();
        let backend = Arc::clone(&self.backend);
        self.in_flight.push(
            async move {
                let result = backend.get_active().await;
                Completion::Poll {
                    ticket,
                    result,
                    reply,
                }
            }
            .boxed(),
        );
    }

    fn on_completion(&mut self, done: Completion) {
        match done {
            Completion::Write { revision, result } => {
                self.writing = false;
                let ack = self.client.ack_write(revision, &result);
                match result {
                    Err(e) => self.write_error = Some(e),
                    Ok(()) if ack == WriteAck::Current => self.write_error = None,
                    Ok(()) => {}
                }
                if let Some(next) = self.queued_write.take() {
                    self.send_write(next);
                }
            }
            Completion::Poll {
                ticket,
                result,
                reply,
            } => {
                self.polls_in_flight = self.polls_in_flight.saturating_sub(1);
                let outcome = match result {
                    Ok(remote) => {
                        let reconciled = self.client.apply_poll(ticket, remote);
                        if matches!(
                            reconciled,
                            Reconciled::Restored | Reconciled::Replaced | Reconciled::Cleared
                        ) {
                            self.publish();
                        }
                        Ok(reconciled)
                    }
                    Err(e) => {
                        // Local state survives transient failures
                        warn!("Failed to fetch the shared timer: {}", e);
                        Err(e)
                    }
                };
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
        }
    }

    async fn drain_writes(&mut self) {
        while self.client.writes_in_flight() > 0 {
            match self.in_flight.next().await {
                Some(done) => self.on_completion(done),
                None => break,
            }
        }
    }

    fn on_tick(&mut self) {
        if self.client.tick(time::now()).is_some() {
            self.publish();
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.client.view(time::now()));
    }
}
