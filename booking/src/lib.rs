pub mod api;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod db;
pub mod hold;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod payment;
pub mod slot;

pub mod error;

#[cfg(test)]
mod test_support;
