pub mod command;
pub mod webhook;
