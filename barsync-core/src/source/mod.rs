//! Market data source: the session trait and the quote-gateway adapter.

pub mod gateway;
pub mod session;

pub use gateway::{GatewaySession, DEFAULT_GATEWAY_URL};
pub use session::{MarketSession, SessionError};
