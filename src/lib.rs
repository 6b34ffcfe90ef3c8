pub mod audit;
pub mod config;
pub mod loader;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod records;
pub mod registry;
pub mod route;
pub mod station;
pub mod stats;
pub mod temporal;
pub mod validate;
