//! LAN reconnaissance engine: liveness, port scanning, banner grabbing,
//! vendor lookup and device classification.

pub mod banner;
pub mod classify;
pub mod liveness;
pub mod network;
pub mod pipeline;
pub mod port_scan;
pub mod vendors;

pub use pipeline::{Pipeline, PipelineBuilder, RunReport};
