//! services/api/src/lib.rs
//!
//! The invoice API service: HTTP handlers, the realtime notification channel,
//! and the storage adapters behind the core ports.

pub mod adapters;
pub mod config;
pub mod error;
pub mod realtime;
pub mod web;
