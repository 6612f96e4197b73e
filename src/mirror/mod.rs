//! # Mirror Module
//!
//! Side-effect sink for the broker link: every inbound message is decoded
//! into a pin command and drawn onto the status panel.
//!
//! ## Module Architecture
//!
//! ```text
//! mirror/
//! ├── pin.rs    - OutputDrive trait, rppal GPIO drive, active-low handling
//! └── panel.rs  - Fixed-layout status panel and render surface
//! ```
//!
//! The mirror task is the only owner of the drive and the panel, so both
//! stay lock-free; it consumes the message channel and the status watch the
//! link engine produces.

pub mod panel;
pub mod pin;

use crate::link::message::BeaconMessage;
use crate::link::supervisor::LinkStatus;
use panel::{Panel, Surface};
use pin::OutputDrive;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs the mirror loop until the token is cancelled.
///
/// On every message: decode the first payload byte, drive the pin, store
/// topic and payload on the panel, redraw. The panel additionally redraws
/// on link status changes and on each marker animation frame. With the
/// panel disabled only the pin mirroring remains.
pub async fn run(
    mut messages: mpsc::Receiver<BeaconMessage>,
    mut status: watch::Receiver<LinkStatus>,
    mut drive: Box<dyn OutputDrive>,
    mut panel: Option<(Panel, Box<dyn Surface>)>,
    frame_period: Duration,
    cancel: CancellationToken,
) {
    info!(
        "Mirror task started (panel {})",
        if panel.is_some() { "enabled" } else { "disabled" }
    );

    let mut frames = tokio::time::interval(frame_period);
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Initial frame so the panel shows something before any traffic.
    if let Some((panel, surface)) = panel.as_mut() {
        surface.draw(&panel.render());
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            message = messages.recv() => {
                let Some(message) = message else {
                    debug!("Message channel closed, stopping mirror task");
                    break;
                };
                info!("Message arrived [{}] {}", message.topic(), message.payload());

                if let Some(command) = message.command() {
                    drive.apply(command);
                }

                if let Some((panel, surface)) = panel.as_mut() {
                    panel.set_message(message.topic(), message.payload());
                    surface.draw(&panel.render());
                }
            }

            changed = status.changed() => {
                if changed.is_err() {
                    debug!("Status channel closed, stopping mirror task");
                    break;
                }
                let state = status.borrow_and_update().connection_state;
                if let Some((panel, surface)) = panel.as_mut() {
                    panel.set_connection_state(state);
                    surface.draw(&panel.render());
                }
            }

            _ = frames.tick() => {
                if let Some((panel, surface)) = panel.as_mut() {
                    panel.tick();
                    surface.draw(&panel.render());
                }
            }
        }
    }

    info!("Mirror task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::message::PinCommand;
    use crate::link::supervisor::ConnectionState;
    use panel::PANEL_ROWS;
    use std::sync::{Arc, Mutex};

    /// Drive that records every applied command.
    struct RecordingDrive(Arc<Mutex<Vec<PinCommand>>>);

    impl OutputDrive for RecordingDrive {
        fn apply(&mut self, command: PinCommand) {
            self.0.lock().unwrap().push(command);
        }
    }

    /// Surface that records every frame drawn.
    struct RecordingSurface(Arc<Mutex<Vec<[String; PANEL_ROWS]>>>);

    impl Surface for RecordingSurface {
        fn draw(&mut self, frame: &[String; PANEL_ROWS]) {
            self.0.lock().unwrap().push(frame.clone());
        }
    }

    #[tokio::test]
    async fn messages_drive_the_pin_and_the_panel() {
        let commands = Arc::new(Mutex::new(Vec::new()));
        let frames = Arc::new(Mutex::new(Vec::new()));

        let (message_tx, message_rx) = mpsc::channel(8);
        let (_status_tx, status_rx) = watch::channel(LinkStatus::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            message_rx,
            status_rx,
            Box::new(RecordingDrive(commands.clone())),
            Some((Panel::new(), Box::new(RecordingSurface(frames.clone())))),
            Duration::from_secs(3600),
            cancel.clone(),
        ));

        message_tx
            .send(BeaconMessage::from_publish("inTopic", b"1"))
            .await
            .unwrap();
        message_tx
            .send(BeaconMessage::from_publish("inTopic", b"0"))
            .await
            .unwrap();
        // Empty payload: no pin command, but the panel still updates.
        message_tx
            .send(BeaconMessage::from_publish("inTopic", b""))
            .await
            .unwrap();

        // Closing the channel ends the loop once all messages are drained.
        drop(message_tx);
        task.await.unwrap();

        assert_eq!(
            *commands.lock().unwrap(),
            vec![PinCommand::Assert, PinCommand::Deassert]
        );
        let frames = frames.lock().unwrap();
        assert!(frames.len() >= 4, "initial frame plus one per message");
        assert_eq!(frames.last().unwrap()[4], "inTopic");
    }

    #[tokio::test]
    async fn status_changes_redraw_the_panel() {
        let frames = Arc::new(Mutex::new(Vec::new()));

        let (message_tx, message_rx) = mpsc::channel(8);
        let (status_tx, status_rx) = watch::channel(LinkStatus::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(
            message_rx,
            status_rx,
            Box::new(pin::NullDrive),
            Some((Panel::new(), Box::new(RecordingSurface(frames.clone())))),
            Duration::from_secs(3600),
            cancel.clone(),
        ));

        let mut up = LinkStatus::default();
        up.connection_state = ConnectionState::Connected;
        status_tx.send(up).unwrap();

        // Give the loop a chance to observe the change, then stop it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        task.await.unwrap();
        drop(message_tx);

        let frames = frames.lock().unwrap();
        assert!(!frames.is_empty());
        assert!(frames.last().unwrap()[2].contains("up"));
    }
}
