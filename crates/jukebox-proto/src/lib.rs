//! Wire protocol, naming rules and configuration shared by the jukebox
//! client library and its front-ends.

pub mod config;
pub mod naming;
pub mod platform;
pub mod protocol;
pub mod query;
