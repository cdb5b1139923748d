pub mod audio_host;
pub mod cancellation;
pub mod status_observer;
