//! Client code for offgrid.
//!
//! This crate provides the network layer and the offline cache gateway
//! (request strategies, lifecycle, background sync, push and page commands)
//! used by the server.

pub mod fetch;
pub mod gateway;

pub use fetch::{FetchConfig, GatewayRequest, GatewayResponse, HttpNetwork, Network, RequestMode, Scope};

pub use gateway::{
    Command, CommandReply, EventOutcome, Gateway, GatewayEvent, GatewayOptions, Interception, ResponseSource, SyncTag,
    TracingNotifier, WindowRegistry,
};
