pub mod channel;
pub mod events;
pub mod keepalive;
pub mod relay;
pub mod router;
pub mod server;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use relay::RelayServer;
