//! Terminal client for a conversational bot.
//!
//! - `config`: command line arguments and environment configuration.
//! - `console`: the [`botline_core::ClientCallback`] used by the `botline` binary.

pub mod config;
pub mod console;
