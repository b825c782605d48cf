// guestinfo-cli: Clap commands and logging setup
// Depends on guestinfo-core, guestinfo-runtime

pub mod commands;
pub mod logging;

pub use commands::run;
