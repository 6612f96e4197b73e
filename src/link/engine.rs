//! Broker link engine with statum state machine for session lifecycle.
//!
//! Owns the rumqttc client and event loop and runs the single control loop:
//! poll the broker, pace reconnect attempts through the supervisor gate, and
//! publish counter telemetry on its period. Inbound messages are forwarded
//! to the mirror task over a channel; link health goes out over a watch.
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Active ──► Deactivated
//!                    │
//!              (run_until_shutdown)
//! ```

use crate::config::BeaconConfig;
use crate::link::message::BeaconMessage;
use crate::link::supervisor::{AttemptDecision, ConnectionState, LinkStatus, ReconnectGate};
use crate::link::telemetry::TelemetryClock;
use crate::link::LinkError;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use statum::{machine, state};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// States for the link engine lifecycle using statum
#[state]
#[derive(Debug, Clone)]
pub enum LinkEngineState {
    Initializing, // Client built, not yet polling
    Active,       // Running the poll/publish loop
    Deactivated,  // Fully stopped
}

/// Broker link engine with compile-time state safety via statum
///
/// Wraps the rumqttc client/event loop pair together with the supervisor
/// gate and the telemetry clock. All session state lives here; the loop is
/// the only writer, so nothing needs a lock.
#[machine]
pub struct LinkEngine<S: LinkEngineState> {
    client: AsyncClient,
    event_loop: EventLoop,
    publish_topic: String,
    subscribe_topic: String,
    announcement: String,
    clock: TelemetryClock,
    gate: ReconnectGate,
    status: LinkStatus,
    message_tx: mpsc::Sender<BeaconMessage>,
    status_tx: watch::Sender<LinkStatus>,
}

impl LinkEngine<Initializing> {
    pub fn create(
        config: &BeaconConfig,
        message_tx: mpsc::Sender<BeaconMessage>,
        status_tx: watch::Sender<LinkStatus>,
    ) -> Self {
        info!(
            "Initializing link engine for {}:{} as '{}'",
            config.broker.host, config.broker.port, config.broker.client_id
        );

        let mut options = MqttOptions::new(
            config.broker.client_id.clone(),
            config.broker.host.clone(),
            config.broker.port,
        );
        options.set_keep_alive(Duration::from_secs(config.broker.keep_alive_secs));
        if let Some((user, password)) = config.broker.credentials() {
            options.set_credentials(user, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self::new(
            client,
            event_loop,
            config.topics.publish.clone(),
            config.topics.subscribe.clone(),
            config.topics.announcement.clone(),
            TelemetryClock::new(config.telemetry.period()),
            ReconnectGate::new(config.reconnect),
            LinkStatus::default(),
            message_tx,
            status_tx,
        )
    }

    pub fn activate(self) -> LinkEngine<Active> {
        info!("Activating link engine");
        self.transition()
    }
}

impl LinkEngine<Active> {
    /// Main session loop with graceful shutdown support
    ///
    /// Runs until the token is cancelled. A lost session is never fatal:
    /// an exhausted blocking retry cycle is logged and a fresh cycle
    /// starts; the interval policy defers between attempts without ever
    /// stalling longer than the remaining wait.
    pub async fn run_until_shutdown(
        mut self,
        cancel: CancellationToken,
    ) -> LinkEngine<Deactivated> {
        info!("Starting broker session loop");

        let mut ticker = tokio::time::interval(self.clock.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.gate.decide(Instant::now()) {
                AttemptDecision::Exhausted => {
                    let spent = self.gate.failed_attempts();
                    error!("{}", LinkError::RetriesExhausted(spent));
                    self.gate.reset_cycle();
                    continue;
                }
                AttemptDecision::Defer { remaining } => {
                    debug!("Reconnect deferred for {:?}", remaining);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(remaining) => {}
                    }
                    continue;
                }
                AttemptDecision::Attempt { pause } if !pause.is_zero() => {
                    debug!("Pausing {:?} before reconnect attempt", pause);
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(pause) => {}
                    }
                }
                AttemptDecision::Attempt { .. } | AttemptDecision::Idle => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,

                event = self.event_loop.poll() => {
                    self.handle_event(event).await;
                }

                _ = ticker.tick() => {
                    self.publish_telemetry().await;
                }
            }
        }

        info!("Broker session loop stopped");
        self.transition()
    }

    async fn handle_event(&mut self, event: Result<Event, ConnectionError>) {
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("Connected to broker");
                self.gate.record_connected();
                self.status.connection_state = ConnectionState::Connected;
                self.status.connects += 1;
                self.status.touch();

                // Resubscribe once per successful handshake, then announce.
                if let Err(e) = self
                    .client
                    .subscribe(self.subscribe_topic.clone(), QoS::AtMostOnce)
                    .await
                {
                    error!("{}", LinkError::SubscribeError(e.to_string()));
                } else {
                    debug!("Subscribed to '{}'", self.subscribe_topic);
                }

                match self
                    .client
                    .publish(
                        self.publish_topic.clone(),
                        QoS::AtMostOnce,
                        false,
                        self.announcement.clone(),
                    )
                    .await
                {
                    Ok(_) => self.status.messages_sent += 1,
                    Err(e) => warn!("{}", LinkError::PublishError(e.to_string())),
                }

                self.push_status();
            }

            Ok(Event::Incoming(Packet::Publish(publish))) => {
                debug!(
                    "Message arrived on '{}' ({} bytes)",
                    publish.topic,
                    publish.payload.len()
                );
                let message = BeaconMessage::from_publish(&publish.topic, &publish.payload);
                self.status.messages_received += 1;
                self.status.touch();

                if let Err(e) = self.message_tx.try_send(message) {
                    warn!("{}", LinkError::ChannelError(e.to_string()));
                }

                self.push_status();
            }

            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker sent disconnect");
                self.mark_disconnected();
            }

            Ok(_) => {}

            Err(e) => {
                let was_connected = self.gate.state() == ConnectionState::Connected;
                if was_connected {
                    warn!("Connection lost: {}", e);
                } else {
                    warn!("{}", LinkError::ConnectionError(e.to_string()));
                    self.gate.record_failed_attempt(Instant::now());
                }
                self.mark_disconnected();
            }
        }
    }

    async fn publish_telemetry(&mut self) {
        if self.gate.state() != ConnectionState::Connected {
            return;
        }
        let Some(counter) = self.clock.due(Instant::now()) else {
            return;
        };

        let payload = TelemetryClock::format_message(&self.announcement, counter);
        info!("Publish message: {}", payload);

        match self
            .client
            .publish(self.publish_topic.clone(), QoS::AtMostOnce, false, payload)
            .await
        {
            Ok(_) => {
                self.status.messages_sent += 1;
                self.status.touch();
                self.push_status();
            }
            Err(e) => {
                // Dropped; the next tick publishes the next counter value.
                warn!("{}", LinkError::PublishError(e.to_string()));
            }
        }
    }

    fn mark_disconnected(&mut self) {
        self.gate.record_disconnected();
        if self.status.connection_state != ConnectionState::Disconnected {
            self.status.connection_state = ConnectionState::Disconnected;
            self.push_status();
        }
    }

    fn push_status(&self) {
        self.status_tx.send_replace(self.status.clone());
    }
}

impl LinkEngine<Deactivated> {}

/// Handle for managing the link engine in a tokio task
///
/// Handles task spawning, graceful shutdown, and resource cleanup.
pub struct LinkHandle {
    task_handle: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl LinkHandle {
    /// Starts the engine in a background task and returns the channels the
    /// mirror task consumes.
    pub fn spawn(
        config: &BeaconConfig,
    ) -> (
        Self,
        mpsc::Receiver<BeaconMessage>,
        watch::Receiver<LinkStatus>,
    ) {
        let (message_tx, message_rx) = mpsc::channel(100);
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());

        let engine = LinkEngine::create(config, message_tx, status_tx);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let task_handle = tokio::spawn(async move {
            let active = engine.activate();
            let _deactivated = active.run_until_shutdown(task_cancel).await;
        });

        (
            LinkHandle {
                task_handle: Some(task_handle),
                cancel,
            },
            message_rx,
            status_rx,
        )
    }

    /// Cancels the session loop and waits for the task to finish.
    pub async fn shutdown(&mut self) {
        debug!("Sending shutdown signal to link engine");
        self.cancel.cancel();

        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                error!("Link engine task panicked: {}", e);
            }
        } else {
            debug!("Link engine already shut down");
        }
    }
}
