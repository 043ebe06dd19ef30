//! Hosted text generation.
//!
//! A generator takes one free-text prompt and returns at most one completion.
//! `Ok(None)` means the service answered but produced nothing usable.

use async_trait::async_trait;

use crate::error::Result;

pub mod vertex;

pub use vertex::{GenerationParameters, VertexTextGenerator};

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Option<String>>;
}

#[async_trait]
impl<G: TextGenerator + ?Sized> TextGenerator for std::sync::Arc<G> {
    async fn generate(&self, prompt: &str) -> Result<Option<String>> {
        (**self).generate(prompt).await
    }
}
