// Copyright 2026 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Re-export embedding functionality from octolib
pub use octolib::embedding::{
    parse_provider_model, provider::create_embedding_provider_from_parts,
    provider::EmbeddingProvider, types::InputType,
};

/// Create embedding provider from config
pub async fn create_embedding_provider(
    config: &crate::config::EmbeddingConfig,
) -> anyhow::Result<Box<dyn EmbeddingProvider>> {
    let (provider, model) = parse_provider_model(&config.model)?;
    create_embedding_provider_from_parts(&provider, &model).await
}

/// Generate embeddings for many texts, at most `batch_size` per provider call
pub async fn generate_embeddings_batched(
    texts: Vec<String>,
    batch_size: usize,
    provider: &dyn EmbeddingProvider,
) -> anyhow::Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut embeddings = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let mut batch_embeddings = provider
            .generate_embeddings_batch(batch.to_vec(), InputType::None)
            .await?;
        if batch_embeddings.len() != batch.len() {
            anyhow::bail!(
                "Embedding provider returned {} vectors for {} texts",
                batch_embeddings.len(),
                batch.len()
            );
        }
        embeddings.append(&mut batch_embeddings);
    }

    Ok(embeddings)
}
