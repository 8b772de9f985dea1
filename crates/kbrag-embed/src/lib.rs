pub mod fake;
pub mod openai;
pub mod pool;

use std::sync::Arc;
use tracing::info;

use kbrag_core::config::EmbeddingSettings;
use kbrag_core::traits::Embedder;
use kbrag_core::Result;

pub use fake::FakeEmbedder;
pub use openai::OpenAiEmbedder;
pub use pool::{cosine_similarity, l2_normalize};

pub const FAKE_EMBEDDING_DIM: usize = 1024;

/// `APP_USE_FAKE_EMBEDDINGS=1` (or `true`) swaps the remote embedder for [`FakeEmbedder`].
pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if use_fake_embeddings() {
        let dim = settings.dimensions.unwrap_or(FAKE_EMBEDDING_DIM);
        info!(dim, "using fake embeddings");
        return Ok(Arc::new(FakeEmbedder::new(dim)));
    }
    let embedder = OpenAiEmbedder::from_settings(settings)?;
    info!(model = %settings.model, base_url = %settings.base_url, "using remote embeddings");
    Ok(Arc::new(embedder))
}
