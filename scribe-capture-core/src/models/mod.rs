pub mod config;
pub mod device;
pub mod error;
pub mod quality;
pub mod state;
pub mod stats;
pub mod status;
