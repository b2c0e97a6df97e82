//! Container Integration Tests
//!
//! Tests for install, resolve, start/stop, update, uninstall and refresh
//! through the public container API.

#[path = "../common/mod.rs"]
mod common;

mod lifecycle;
mod refresh;
mod update_uninstall;
