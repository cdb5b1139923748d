pub mod encoder;
pub mod status_file;
pub mod stop_marker;
