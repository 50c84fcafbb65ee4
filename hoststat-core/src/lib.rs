//! Hoststat core - pieces shared by the collector, the directory and the viewer
//!
//! - Metric snapshot and its CBOR wire encoding
//! - Host records and the topic key each host publishes on
//! - The publish/subscribe bus capability, with an MQTT backend
//! - Reconnect/retry backoff and logging setup for the binaries

pub mod backoff;
pub mod bus;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod snapshot;
pub mod topic;

pub use backoff::Backoff;
pub use bus::{Bus, Payload, Subscription, SubscriptionId};
pub use config::BrokerConfig;
pub use error::{BusError, CodecError, ValidationError};
pub use host::{HostId, HostRecord, HostView};
pub use snapshot::MetricSnapshot;
pub use topic::TopicScheme;
