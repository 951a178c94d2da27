//! Batch text-to-image generation against the Hugging Face inference API.
//!
//! A batch fires one request per card concurrently and reports each card as
//! it settles, independently of its siblings. A small HTTP proxy exposes
//! single-image generation without handing the API key to callers.

pub mod ai;
pub mod app;
pub mod batch;
pub mod dimensions;
pub mod error;
pub mod gallery;
pub mod image;
pub mod models;
pub mod prompts;
pub mod server;

pub use error::{Error, Result};
