//! Live feed client: keeps a push connection to a stream server open,
//! decodes each post and shows it in a bounded, newest-first feed.

pub mod config;
pub mod feeds;
pub mod headless;
pub mod location;
pub mod logging;
pub mod renderer;
pub mod ui;
