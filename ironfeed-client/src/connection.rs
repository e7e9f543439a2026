//! Feed connection task.
//!
//! One task owns the transport, the connection state and every write into
//! the stores. It loops through connect, replay and read until shutdown or
//! until reconnect attempts run out.

use crate::config::FeedConfig;
use crate::error::ClientError;
use crate::events::FeedEvent;
use crate::handle::FeedShared;
use crate::reconnect::ReconnectState;
use crate::registry::Intent;
use crate::session::{Connector, FeedTransport, FrameSink, OutboundFrame};
use crate::state::ConnectionState;
use futures::{SinkExt, StreamExt};
use ironfeed_core::{Channel, ControlFrame, InboundFrame, ProductId, SubscriptionKey, decode_frame};
use ironfeed_marketdata::{BookError, ResyncTracker, SequenceCheck, SequenceTracker};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, interval_at, sleep, timeout};
use tokio_util::sync::CancellationToken;

/// The feed connection. Drive it with [`run`](Self::run).
pub struct FeedConnection {
    config: FeedConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<FeedShared>,
    reconnect_state: ReconnectState,
    sequence: SequenceTracker,
    resyncs: ResyncTracker,
    /// Set once the current session decoded a frame.
    healthy: bool,
}

impl FeedConnection {
    pub(crate) fn new(
        config: FeedConfig,
        connector: Arc<dyn Connector>,
        shared: Arc<FeedShared>,
    ) -> Self {
        Self {
            reconnect_state: ReconnectState::new(config.reconnect.clone()),
            resyncs: ResyncTracker::new(config.resync_timeout),
            sequence: SequenceTracker::new(),
            healthy: false,
            config,
            connector,
            shared,
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }

    /// Runs the connection until shutdown.
    ///
    /// # Errors
    /// Returns `ClientError::MaxReconnectAttempts` once reconnecting is no
    /// longer allowed.
    pub async fn run(mut self) -> Result<(), ClientError> {
        let shutdown = self.shared.shutdown.clone();
        let result = loop {
            if shutdown.is_cancelled() {
                break Ok(());
            }

            match self.connect_and_run().await {
                Ok(()) => break Ok(()),
                Err(e) => {
                    self.shared.registry.set_state(ConnectionState::Disconnected);
                    tracing::warn!(
                        error = %e,
                        endpoint = self.connector.endpoint(),
                        "feed connection lost"
                    );

                    let Some(delay) = self.reconnect_state.on_failure() else {
                        tracing::error!(
                            attempts = self.reconnect_state.attempts(),
                            "giving up reconnecting"
                        );
                        break Err(ClientError::MaxReconnectAttempts);
                    };
                    tracing::info!(
                        ?delay,
                        attempt = self.reconnect_state.attempts(),
                        "reconnecting"
                    );

                    let cancelled = tokio::select! {
                        () = shutdown.cancelled() => true,
                        () = sleep(delay) => false,
                    };
                    if cancelled {
                        break Ok(());
                    }
                }
            }
        };

        self.shared.registry.set_state(ConnectionState::Disconnected);
        tracing::info!("feed connection stopped");
        result
    }

    async fn connect_and_run(&mut self) -> Result<(), ClientError> {
        let shutdown = self.shared.shutdown.clone();
        let shared = Arc::clone(&self.shared);

        shared.registry.set_state(ConnectionState::Connecting);
        let connector = Arc::clone(&self.connector);
        let transport = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            result = timeout(self.config.connect_timeout, connector.connect()) => {
                result.map_err(|_| ClientError::ConnectTimeout)??
            }
        };
        let FeedTransport {
            mut sink,
            mut stream,
        } = transport;

        self.healthy = false;
        self.sequence.reset();
        self.resyncs.clear();
        tracing::info!(endpoint = connector.endpoint(), "connected");

        self.replay(&mut sink).await?;

        let ping_interval = self.config.ping_interval.max(Duration::from_millis(1));
        let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);
        let idle_timeout = self.config.idle_timeout;
        let idle = sleep(idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    let _ = sink.close().await;
                    return Ok(());
                }

                () = shared.registry.intents_ready() => {
                    for intent in shared.registry.take_pending() {
                        self.send_intent(&mut sink, intent).await?;
                    }
                }

                _ = ping.tick() => {
                    sink.send(OutboundFrame::Ping).await?;
                    self.retry_expired_resyncs(&mut sink).await?;
                }

                () = &mut idle => {
                    return Err(ClientError::IdleTimeout(idle_timeout));
                }

                message = stream.next() => match message {
                    Some(Ok(text)) => {
                        idle.as_mut().reset(Instant::now() + idle_timeout);
                        self.handle_text(&mut sink, &text).await?;
                    }
                    Some(Err(e)) => return Err(e),
                    None => return Err(ClientError::ConnectionClosed),
                },
            }
        }
    }

    /// Sends one subscribe per desired topic, then whatever was queued
    /// while replaying, and finally enters `Connected`.
    async fn replay(&mut self, sink: &mut FrameSink) -> Result<(), ClientError> {
        let shared = Arc::clone(&self.shared);
        let registry = &shared.registry;
        let keys = registry.begin_resubscribe();
        tracing::info!(topics = keys.len(), "replaying subscriptions");

        if self.config.heartbeats {
            send_control(sink, &ControlFrame::heartbeats()).await?;
        }
        for key in keys {
            self.subscribe(sink, &key).await?;
        }
        while let Some(intents) = registry.complete_resubscribe() {
            for intent in intents {
                self.send_intent(sink, intent).await?;
            }
        }
        Ok(())
    }

    async fn send_intent(
        &mut self,
        sink: &mut FrameSink,
        intent: Intent,
    ) -> Result<(), ClientError> {
        match intent {
            Intent::Subscribe(key) => self.subscribe(sink, &key).await,
            Intent::Unsubscribe(key) => {
                if key.channel == Channel::Level2 {
                    self.resyncs.complete(&key.product_id);
                }
                send_control(sink, &ControlFrame::unsubscribe(&key)).await
            }
        }
    }

    async fn subscribe(
        &mut self,
        sink: &mut FrameSink,
        key: &SubscriptionKey,
    ) -> Result<(), ClientError> {
        send_control(sink, &ControlFrame::subscribe(key)).await?;
        self.shared.dispatcher.mark_subscribed(key);
        Ok(())
    }

    async fn handle_text(&mut self, sink: &mut FrameSink, text: &str) -> Result<(), ClientError> {
        let frame = match decode_frame(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "malformed frame dropped");
                return Ok(());
            }
        };

        // An accepted handshake alone does not reset the backoff.
        if !self.healthy {
            self.healthy = true;
            self.reconnect_state.on_success();
        }

        if let Some(seq) = frame.sequence_num() {
            match self.sequence.check(seq) {
                SequenceCheck::Duplicate => {
                    tracing::debug!(seq, "duplicate frame dropped");
                    return Ok(());
                }
                SequenceCheck::Gap { expected, received } => {
                    tracing::warn!(expected, received, "sequence gap");
                    self.shared
                        .events
                        .send(FeedEvent::GapDetected { expected, received });
                    if self.config.resync_on_gap {
                        for product_id in self.shared.dispatcher.live_books() {
                            self.request_resync(sink, &product_id, None).await?;
                        }
                    }
                }
                SequenceCheck::First | SequenceCheck::InOrder => {}
            }
        }

        match frame {
            InboundFrame::Data(frame) => {
                let report = self.shared.dispatcher.dispatch(&frame);
                for product_id in &report.snapshots {
                    if self.resyncs.complete(product_id) {
                        tracing::info!(product = %product_id, "order book resynced");
                    }
                }
                for (product_id, err) in report.resyncs {
                    self.request_resync(sink, &product_id, Some(err)).await?;
                }
            }
            InboundFrame::Ignored { channel, .. } => {
                tracing::trace!(%channel, "frame acknowledged");
            }
            InboundFrame::Error { message } => {
                tracing::warn!(%message, "exchange reported an error");
            }
        }
        Ok(())
    }

    async fn request_resync(
        &mut self,
        sink: &mut FrameSink,
        product_id: &ProductId,
        reason: Option<BookError>,
    ) -> Result<(), ClientError> {
        if !self.resyncs.request(product_id, reason) {
            return Ok(());
        }
        self.resubscribe_book(sink, product_id).await
    }

    async fn retry_expired_resyncs(&mut self, sink: &mut FrameSink) -> Result<(), ClientError> {
        for request in self.resyncs.expired() {
            tracing::warn!(product = %request.product_id, "resync timed out, retrying");
            self.resubscribe_book(sink, &request.product_id).await?;
        }
        Ok(())
    }

    async fn resubscribe_book(
        &mut self,
        sink: &mut FrameSink,
        product_id: &ProductId,
    ) -> Result<(), ClientError> {
        let key = SubscriptionKey::new(Channel::Level2, product_id.clone());
        if !self.shared.registry.is_desired(&key) {
            self.resyncs.complete(product_id);
            return Ok(());
        }

        tracing::warn!(product = %product_id, "resubscribing order book");
        self.shared.dispatcher.reset_book(product_id);
        self.shared
            .events
            .send(FeedEvent::ResyncRequested(product_id.clone()));
        send_control(sink, &ControlFrame::unsubscribe(&key)).await?;
        self.subscribe(sink, &key).await
    }
}

impl std::fmt::Debug for FeedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedConnection")
            .field("endpoint", &self.connector.endpoint())
            .field("state", &self.shared.registry.state())
            .finish_non_exhaustive()
    }
}

async fn send_control(sink: &mut FrameSink, frame: &ControlFrame) -> Result<(), ClientError> {
    let text = frame.encode()?;
    tracing::debug!(frame = %text, "control frame");
    sink.send(OutboundFrame::Text(text)).await
}
