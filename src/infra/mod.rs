//! Built-in gates of the default dispatch chain.
//!
//! The default chain is [`ConnectivityGate`], then [`EndpointGate`], then
//! [`SendGate`]. The endpoint gate probes through a [`ConnectivityOracle`];
//! with the `http-probe` feature the default oracle is [`HttpProbe`].

pub mod connectivity;
#[cfg(feature = "http-probe")]
pub mod http_probe;
pub mod reachability;
pub mod send;

pub use connectivity::{ConnectivityGate, ConnectivityHandle};
#[cfg(feature = "http-probe")]
pub use http_probe::HttpProbe;
pub use reachability::{ConnectivityOracle, EndpointGate};
pub use send::SendGate;
