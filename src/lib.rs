pub mod committers;
pub mod config;
pub mod defaults;
pub mod gitlab;
pub mod handler;
pub mod template;
pub mod verifier;
pub mod webhook;
