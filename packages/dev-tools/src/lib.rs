//! FormSpec development tools
//!
//! - [`dev_server`] - JSON HTTP server over the form engine for browser testing

pub mod dev_server;
