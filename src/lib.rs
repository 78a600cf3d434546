// Library exports for integration testing and binary
pub mod analysis;
pub mod config;
pub mod error;
pub mod explain;
pub mod gm;
pub mod midi;
pub mod pitch;
pub mod playback;
pub mod verify;
