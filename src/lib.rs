pub mod backlog;
pub mod config;
pub mod duration;
pub mod engine;
pub mod error;
pub mod events;
pub mod ledger;
pub mod mirror;
pub mod models;
pub mod operator;
pub mod output;
pub mod pool;
pub mod remote;
pub mod seeds;
pub mod sim;
pub mod state;
pub mod tick;
pub mod ticker;
