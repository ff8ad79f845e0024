// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod telemetry;

// Domain layer (connection lifecycle and events)
pub mod auth;
pub mod connection;
pub mod dispatcher;
pub mod events;
pub mod groups;
pub mod transport;

// Application layer
pub mod client;

pub use auth::{StaticTokenProvider, TokenProvider};
pub use client::{AttendanceRealtimeClient, Subscription};
pub use config::Settings;
pub use connection::ConnectionState;
pub use error::{ClientError, ConnectError, Result};
pub use events::{AttendanceEvent, AttendanceEventType, AttendanceRecord, RecordedBy};
