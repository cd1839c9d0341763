pub mod config;
pub mod control;
pub mod daemon;
pub mod status;
pub mod watch;
