//! Discord Integration - config-driven interaction handling
//!
//! This crate turns the loaded command table into a working Discord bot:
//! - **Events** (`events`) - interaction model, payload decoding, dispatcher
//! - **Commands** (`commands`) - slash and modal pipelines
//! - **Components** (`components`) - modal forms, command options, responses
//! - **Validation** (`validation`) - per-field and full-form checks
//! - **Webhooks** (`webhook`) - outbound calls and remote option lookups
//! - **Gateway** (`gateway`) - interaction stream runner with reconnection
//! - **REST** (`rest`) - interaction callbacks and command registration
//!
//! # Architecture
//!
//! ```text
//! Gateway → InteractionDispatcher → CommandPipeline → Webhook / Templater
//!                    ↓
//!         InteractionResponse → REST callback
//! ```

pub mod commands;
pub mod components;
pub mod events;
pub mod gateway;
pub mod rest;
pub mod validation;
pub mod webhook;
