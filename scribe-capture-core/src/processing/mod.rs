pub mod level;
pub mod pcm;
