pub mod common;
pub mod errors;
pub mod graph_io;
pub mod merge;
pub mod network;
pub mod plan;
pub mod plan_execution;
pub mod services;
