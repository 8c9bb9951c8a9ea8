//! lbwatch - load-balancer pool health watcher
//!
//! Polls the pools API on a fixed interval, renders pools and origins as a
//! terminal table and plays an audio cue whenever an origin goes offline or
//! comes back online.

pub mod api;
pub mod cancel;
pub mod config;
pub mod credentials;
pub mod health;
pub mod notifier;
pub mod poller;
pub mod render;
pub mod supervisor;
pub mod wizard;
