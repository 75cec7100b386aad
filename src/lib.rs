pub mod cli;
pub mod client;
pub mod config;
pub mod daemon;
pub mod health;
pub mod log;
pub mod paths;
pub mod pid;
pub mod ports;
pub mod process;
pub mod protocol;
pub mod rcon;
pub mod resources;
pub mod supervisor;
pub mod sys;
