//! HTTP handlers — the gateway front door and the downstream echo service.

pub mod echo;
pub mod gateway;

use std::sync::Arc;

use mqbridge_services::RequestGateway;

#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<RequestGateway>,
}

impl GatewayState {
    pub fn new(gateway: Arc<RequestGateway>) -> Self {
        Self { gateway }
    }
}

pub use echo::{handle_echo_get, handle_echo_post, handle_hello};
pub use gateway::{handle_ping, handle_request, handle_status};
