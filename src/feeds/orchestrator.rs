use super::backoff::{Backoff, ReconnectPolicy};
use super::connection::{ConnectionState, Connector, StreamConnection};
use super::record::{decode, RawMessage};
use crate::location::{build_target, read_filter};
use crate::renderer::{FeedRenderer, RenderError, RenderSink, TemplateFactory};
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub received: u64,
    pub rendered: u64,
    pub malformed: u64,
    pub render_failures: u64,
    /// Retry timers armed, whether or not an earlier attempt ever opened.
    pub retries_scheduled: u64,
}

/// Snapshot published after every lifecycle change and every message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStatus {
    pub state: ConnectionState,
    pub filter: Option<String>,
    pub target: Option<String>,
    pub retry_in: Option<Duration>,
    pub stats: FeedStats,
}

/// Drives the connect / receive / back off cycle and feeds the renderer.
///
/// There is exactly one [`StreamConnection`] and the retry sleep happens
/// inline in [`Orchestrator::run`], so at most one transport is live and at
/// most one retry is pending at any time.
pub struct Orchestrator<S: RenderSink, T: TemplateFactory> {
    connection: StreamConnection,
    backoff: Backoff,
    renderer: FeedRenderer<T>,
    sink: S,
    location: watch::Receiver<Url>,
    status: watch::Sender<StreamStatus>,
}

impl<S: RenderSink, T: TemplateFactory> Orchestrator<S, T> {
    pub fn new(
        connector: Box<dyn Connector>,
        policy: ReconnectPolicy,
        location: watch::Receiver<Url>,
        sink: S,
        template: T,
    ) -> Self {
        let (status, _) = watch::channel(StreamStatus::default());
        Self {
            connection: StreamConnection::new(connector),
            backoff: Backoff::new(policy),
            renderer: FeedRenderer::new(template),
            sink,
            location,
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> StreamStatus {
        self.status.borrow().clone()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run until `shutdown` turns true (or its sender goes away). Teardown
    /// cancels a pending retry and drops the live transport.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let filter = read_filter(&self.location.borrow());
        info!(filter = filter.as_deref().unwrap_or("<none>"), "starting live feed");
        self.status.send_modify(|status| status.filter = filter);

        loop {
            // The page may have changed since the last attempt.
            let page = self.location.borrow_and_update().clone();
            match build_target(&page) {
                Ok(target) => {
                    let filter = read_filter(&page);
                    self.status.send_modify(|status| {
                        status.state = ConnectionState::Connecting;
                        status.filter = filter;
                        status.target = Some(target.to_string());
                        status.retry_in = None;
                    });

                    let opened = tokio::select! {
                        biased;
                        _ = wait_for_shutdown(&mut shutdown) => break,
                        opened = self.connection.open(&target) => opened,
                    };
                    if let Err(err) = opened {
                        error!(error = %err, "refusing to open a second connection");
                        self.connection.close();
                    }

                    if self.connection.state() == ConnectionState::Open {
                        self.backoff.reset();
                        self.set_state(ConnectionState::Open);
                        if self.pump(&mut shutdown).await.is_break() {
                            break;
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, page = %page, "cannot derive stream endpoint from page");
                }
            }

            let delay = self.backoff.next_delay();
            self.status.send_modify(|status| {
                status.state = ConnectionState::ClosedPendingRetry;
                status.retry_in = Some(delay);
                status.stats.retries_scheduled += 1;
            });
            info!(
                delay_ms = delay.as_millis() as u64,
                attempt = self.backoff.attempt(),
                "reconnect scheduled"
            );

            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.connection.close();
        self.status.send_modify(|status| {
            status.state = ConnectionState::Disconnected;
            status.retry_in = None;
        });
        info!("live feed stopped");
    }

    /// Handle messages until the transport closes (`Continue`), or shutdown
    /// is requested or the display goes away (`Break`).
    async fn pump(&mut self, shutdown: &mut watch::Receiver<bool>) -> ControlFlow<()> {
        loop {
            let raw = tokio::select! {
                biased;
                _ = wait_for_shutdown(shutdown) => return ControlFlow::Break(()),
                raw = self.connection.recv() => raw,
            };
            match raw {
                Some(raw) => {
                    if self.handle_message(&raw).is_break() {
                        return ControlFlow::Break(());
                    }
                }
                None => return ControlFlow::Continue(()),
            }
        }
    }

    fn handle_message(&mut self, raw: &RawMessage) -> ControlFlow<()> {
        let outcome = match decode(raw) {
            Ok(record) => match self.renderer.render(&record, &mut self.sink) {
                Ok(()) => Outcome::Rendered,
                Err(RenderError::SinkClosed) => Outcome::SinkClosed,
                Err(err) => {
                    warn!(error = %err, id = %record.id, "failed to render record");
                    Outcome::RenderFailed
                }
            },
            Err(err) => {
                warn!(target: "livefeed::decode", error = %err, len = raw.as_str().len(), "dropping malformed record");
                Outcome::Malformed
            }
        };

        self.status.send_modify(|status| {
            let stats = &mut status.stats;
            stats.received += 1;
            match outcome {
                Outcome::Rendered => stats.rendered += 1,
                Outcome::Malformed => stats.malformed += 1,
                Outcome::RenderFailed | Outcome::SinkClosed => stats.render_failures += 1,
            }
        });

        if let Outcome::SinkClosed = outcome {
            info!("feed display closed, stopping");
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    fn set_state(&self, state: ConnectionState) {
        self.status.send_modify(|status| status.state = state);
    }
}

#[derive(Clone, Copy)]
enum Outcome {
    Rendered,
    Malformed,
    RenderFailed,
    SinkClosed,
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender also means shutdown.
    let _ = shutdown.wait_for(|stop| *stop).await;
}
