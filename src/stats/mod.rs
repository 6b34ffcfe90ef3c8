//! Reliability statistics over cleaned delay events.
//!
//! Every entry point takes a slice of event references, normally produced
//! by [`EventFilter::apply`], so callers choose the years, lines or codes
//! first and aggregate second.

pub mod filter;
pub mod general;
pub mod line;
pub mod poisson;
pub mod station;
pub mod types;
pub mod utility;

pub use filter::EventFilter;
pub use general::general_delay_stats;
pub use line::{all_line_stats, line_stats};
pub use station::{
    all_station_stats, code_specific_station_stats, consistently_top_stations,
    consistently_top_vehicles, latest_complete_year,
};
pub use types::TimeUnit;
