pub mod auth;
pub mod chat;
pub mod constants;
pub mod framing;
pub mod logging;
pub mod main_helper;
pub mod reducer;
pub mod render;
pub mod session;
pub mod str_utils;
pub mod streaming;
pub mod types;
pub mod upload;

pub use types::*;

pub use main_helper::{AppContext, Args};
