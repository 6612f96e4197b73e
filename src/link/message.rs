//! Inbound message model with capacity-bounded text storage.
//!
//! The broker can hand us arbitrarily long topics and payloads; everything
//! that is kept for the panel or the pin decoder is copied into bounded
//! buffers first so a hostile or misconfigured publisher can never grow our
//! memory use. Truncation always lands on a UTF-8 character boundary.

use chrono::NaiveDateTime;
use std::fmt;

/// Capacity of the stored topic, in bytes.
pub const TOPIC_CAPACITY: usize = 64;

/// Capacity of the stored payload, in bytes.
pub const PAYLOAD_CAPACITY: usize = 128;

/// Owned text that never exceeds `N` bytes.
///
/// Stand-in for a fixed `char[N]` buffer: writes truncate instead of
/// growing, and the stored value is always complete valid UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundedText<const N: usize> {
    inner: String,
}

impl<const N: usize> BoundedText<N> {
    pub fn new(value: &str) -> Self {
        let mut text = Self::default();
        text.set(value);
        text
    }

    /// Overwrites the stored text, truncating to capacity on a character
    /// boundary.
    pub fn set(&mut self, value: &str) {
        let mut end = value.len().min(N);
        while end > 0 && !value.is_char_boundary(end) {
            end -= 1;
        }
        self.inner.clear();
        self.inner.push_str(&value[..end]);
    }

    pub fn as_str(&self) -> &str {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<const N: usize> fmt::Display for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

/// Command carried in the first payload byte of an inbound message.
///
/// `'1'` asserts the output pin, anything else deasserts it. An empty
/// payload carries no command at all and leaves the pin untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinCommand {
    Assert,
    Deassert,
}

impl PinCommand {
    pub fn decode(payload: &[u8]) -> Option<Self> {
        match payload.first() {
            Some(b'1') => Some(PinCommand::Assert),
            Some(_) => Some(PinCommand::Deassert),
            None => None,
        }
    }
}

/// One message received from the broker, trimmed to panel-sized buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeaconMessage {
    topic: BoundedText<TOPIC_CAPACITY>,
    payload: BoundedText<PAYLOAD_CAPACITY>,
    /// First payload byte, kept raw so the pin command survives payloads
    /// that are not valid UTF-8.
    command: Option<PinCommand>,
    timestamp: NaiveDateTime,
}

impl BeaconMessage {
    pub fn from_publish(topic: &str, payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        BeaconMessage {
            topic: BoundedText::new(topic),
            payload: BoundedText::new(&text),
            command: PinCommand::decode(payload),
            timestamp: chrono::Local::now().naive_local(),
        }
    }

    pub fn topic(&self) -> &str {
        self.topic.as_str()
    }

    pub fn payload(&self) -> &str {
        self.payload.as_str()
    }

    pub fn command(&self) -> Option<PinCommand> {
        self.command
    }

    pub fn render(&self) -> String {
        format!(
            "{}: {}\n{}",
            self.timestamp.format("%H:%M:%S"),
            self.topic.as_str(),
            self.payload.as_str()
        )
    }
}

impl fmt::Display for BeaconMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}", self.topic.as_str(), self.payload.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_text_keeps_short_values_intact() {
        let text: BoundedText<16> = BoundedText::new("hello");
        assert_eq!(text.as_str(), "hello");
        assert_eq!(text.len(), 5);
    }

    #[test]
    fn bounded_text_truncates_to_capacity() {
        let text: BoundedText<8> = BoundedText::new("0123456789abcdef");
        assert_eq!(text.as_str(), "01234567");
        assert_eq!(text.len(), 8);
    }

    #[test]
    fn bounded_text_truncates_on_char_boundary() {
        // 'ü' is two bytes; a naive cut at 5 bytes would split it.
        let text: BoundedText<5> = BoundedText::new("abüü");
        assert_eq!(text.as_str(), "abü");
        assert!(text.len() <= 5);
    }

    #[test]
    fn bounded_text_overwrite_clears_previous_value() {
        let mut text: BoundedText<32> = BoundedText::new("first message");
        text.set("x");
        assert_eq!(text.as_str(), "x");
    }

    #[test]
    fn pin_command_asserts_on_one() {
        assert_eq!(PinCommand::decode(b"1"), Some(PinCommand::Assert));
        assert_eq!(PinCommand::decode(b"1 with trailer"), Some(PinCommand::Assert));
    }

    #[test]
    fn pin_command_deasserts_on_anything_else() {
        assert_eq!(PinCommand::decode(b"0"), Some(PinCommand::Deassert));
        assert_eq!(PinCommand::decode(b"x"), Some(PinCommand::Deassert));
        assert_eq!(PinCommand::decode(&[0xff]), Some(PinCommand::Deassert));
    }

    #[test]
    fn pin_command_ignores_empty_payload() {
        assert_eq!(PinCommand::decode(b""), None);
    }

    #[test]
    fn message_buffers_never_exceed_capacity() {
        let long_topic = "t/".repeat(100);
        let long_payload = vec![b'a'; 4096];
        let msg = BeaconMessage::from_publish(&long_topic, &long_payload);
        assert!(msg.topic().len() <= TOPIC_CAPACITY);
        assert!(msg.payload().len() <= PAYLOAD_CAPACITY);
    }

    #[test]
    fn message_decodes_command_from_raw_bytes() {
        let msg = BeaconMessage::from_publish("cmd/led", &[b'1', 0xff, 0xfe]);
        assert_eq!(msg.command(), Some(PinCommand::Assert));
    }

    #[test]
    fn message_render_shows_topic_and_payload() {
        let msg = BeaconMessage::from_publish("inTopic", b"hello world #7");
        let rendered = msg.render();
        assert!(rendered.contains("inTopic"));
        assert!(rendered.contains("hello world #7"));
        assert_eq!(format!("{}", msg), "[inTopic] hello world #7");
    }
}
