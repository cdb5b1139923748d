mod capture_loop;
pub mod recorder;
mod status_reporter;
