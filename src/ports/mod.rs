//! Port traits at the boundary between the domain and its data sources,
//! configuration and output.

pub mod config_port;
pub mod data_port;
pub mod report_port;
