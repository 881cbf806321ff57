pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod lookup;
pub mod model;
pub mod normalize;
pub mod payload;
pub mod transport;
pub mod util;
pub mod webhook;

#[cfg(test)]
pub(crate) mod mock;
