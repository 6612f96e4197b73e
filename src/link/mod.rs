//! # Broker Link Module
//!
//! Everything that talks to the MQTT broker: the session engine, the
//! connection supervisor, the telemetry clock, and the bounded inbound
//! message model.
//!
//! ## Module Architecture
//!
//! ```text
//! link/
//! ├── message.rs     - Bounded topic/payload buffers and pin command decode
//! ├── supervisor.rs  - Connection state and reconnect pacing policies
//! ├── telemetry.rs   - Periodic counter publish pacing
//! ├── engine.rs      - rumqttc session loop with statum lifecycle
//! └── error.rs       - Link error types
//! ```
//!
//! The engine is the only owner of session state; supervisor and telemetry
//! are pure pacing structs it consults with the current instant, which is
//! what keeps them testable without a broker.

pub mod engine;
pub mod error;
pub mod message;
pub mod supervisor;
pub mod telemetry;

pub use error::LinkError;
