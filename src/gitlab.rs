//! A small client for the parts of the GitLab REST API (v4) the bot needs.

mod auth;
mod client;
mod client_builder;
mod error;
pub mod models;
mod ports;
mod result;

pub use auth::Auth;
pub use client::Client;
pub use client_builder::ClientBuilder;
pub use error::Error;
pub use result::Result;
