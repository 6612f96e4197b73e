//! Fixed-layout status panel.
//!
//! Shows link status, the last topic, the last message, and a bouncing
//! decorative marker on the bottom row. Rendering produces plain text rows;
//! the `Surface` trait decides where they go. There is no drawing engine
//! here, just a fixed character grid.

use crate::link::supervisor::ConnectionState;
use tracing::debug;

/// Panel width in characters (128px OLED at the small font).
pub const PANEL_WIDTH: usize = 21;

/// Panel height in rows.
pub const PANEL_ROWS: usize = 8;

/// Where a rendered frame ends up.
pub trait Surface: Send {
    fn draw(&mut self, frame: &[String; PANEL_ROWS]);
}

/// Writes each frame to the log at debug level.
pub struct LogSurface;

impl Surface for LogSurface {
    fn draw(&mut self, frame: &[String; PANEL_ROWS]) {
        for row in frame {
            debug!("|{:<width$}|", row, width = PANEL_WIDTH);
        }
    }
}

/// Marker travel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Left,
    Right,
}

/// Panel model: status, last topic/message, and the marker position.
pub struct Panel {
    connection_state: ConnectionState,
    topic: String,
    message: String,
    marker: usize,
    direction: Direction,
}

impl Default for Panel {
    fn default() -> Self {
        Panel {
            connection_state: ConnectionState::Disconnected,
            topic: String::new(),
            message: String::new(),
            marker: 0,
            direction: Direction::Right,
        }
    }
}

impl Panel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_connection_state(&mut self, state: ConnectionState) {
        self.connection_state = state;
    }

    pub fn set_message(&mut self, topic: &str, message: &str) {
        self.topic = topic.to_string();
        self.message = message.to_string();
    }

    pub fn marker_position(&self) -> usize {
        self.marker
    }

    /// Advances the marker one cell, reversing at either edge.
    pub fn tick(&mut self) {
        match self.direction {
            Direction::Right => {
                if self.marker + 1 >= PANEL_WIDTH {
                    self.direction = Direction::Left;
                    self.marker = self.marker.saturating_sub(1);
                } else {
                    self.marker += 1;
                }
            }
            Direction::Left => {
                if self.marker == 0 {
                    self.direction = Direction::Right;
                    self.marker = 1.min(PANEL_WIDTH - 1);
                } else {
                    self.marker -= 1;
                }
            }
        }
    }

    /// Renders the fixed layout. Every row fits in `PANEL_WIDTH` characters.
    pub fn render(&self) -> [String; PANEL_ROWS] {
        let status = match self.connection_state {
            ConnectionState::Connected => "link: up",
            ConnectionState::Disconnected => "link: down",
        };

        let mut marker_row = " ".repeat(PANEL_WIDTH);
        marker_row.replace_range(self.marker..self.marker + 1, "*");

        [
            fit("openbeacon"),
            "-".repeat(PANEL_WIDTH),
            fit(status),
            fit("topic:"),
            fit(&self.topic),
            fit("msg:"),
            fit(&self.message),
            marker_row,
        ]
    }
}

/// Truncates a line to the panel width on a character boundary.
fn fit(line: &str) -> String {
    line.chars().take(PANEL_WIDTH).collect()
}
