pub mod api;
pub mod bootstrap;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fulfillment;
pub mod ledger;
pub mod middleware;
pub mod orders;
pub mod server;
pub mod settlement;
pub mod wallet;

#[cfg(test)]
pub(crate) mod test_support;
