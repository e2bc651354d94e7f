//! mqbridge-services — correlation, broker adapters, gateway and agent.

pub mod agent;
pub mod broker;
pub mod correlator;
pub mod downstream;
pub mod gateway;
pub mod pending;

pub use agent::ResponseAgent;
pub use broker::{Broker, BrokerError, Envelope, MemoryBroker, MqttBroker, Subscription};
pub use correlator::{CorrelationError, Correlator};
pub use downstream::{DownstreamError, HttpDownstream};
pub use gateway::{GatewayError, GatewayStatus, RequestGateway};
pub use pending::{PendingReplies, ReplyWaiter};
