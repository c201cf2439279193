//! Generative latent optimization codes.

pub use super::*;
pub use crate::error::Error;

use burn::{
    nn::{Embedding, EmbeddingConfig, Initializer},
    tensor::ElementConversion,
};

/// The configuration for [`GloEncoder`].
#[derive(Config, Copy, Debug)]
pub struct GloEncoderConfig {
    /// The number of learnable codes.
    pub num_embeddings: usize,
    /// `D`
    pub embedding_dim: usize,
}

/// A learnable latent code for each integer identifier.
#[derive(Debug, Module)]
pub struct GloEncoder<B: Backend> {
    pub embedding: Embedding<B>,
}

impl GloEncoderConfig {
    /// Initialize from the configuration.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> GloEncoder<B> {
        let embedding = EmbeddingConfig::new(self.num_embeddings, self.embedding_dim)
            .with_initializer(Initializer::Uniform {
                min: 0.0,
                max: 0.05,
            })
            .init(device);

        GloEncoder { embedding }
    }
}

impl<B: Backend> GloEncoder<B> {
    /// `D`
    #[inline]
    pub fn dim_output(&self) -> usize {
        self.embedding.weight.dims()[1]
    }

    /// The number of learnable codes.
    #[inline]
    pub fn num_embeddings(&self) -> usize {
        self.embedding.weight.dims()[0]
    }

    /// Looking up the codes.
    ///
    /// ## Shapes
    ///
    /// * `ids` - `[N]`
    /// * `output` - `[N, D]`
    pub fn forward(
        &self,
        ids: Tensor<B, 1, Int>,
    ) -> Tensor<B, 2> {
        let count = ids.dims()[0];

        self.embedding
            .forward(ids.unsqueeze_dim(1))
            .reshape([count, self.dim_output()])
    }

    /// Looking up the codes of optional ids named `name`.
    ///
    /// ## Errors
    ///
    /// * [`Error::MissingMetadata`] if the ids are absent.
    /// * [`Error::Validation`] if any id has no code.
    pub fn lookup(
        &self,
        ids: Option<&Tensor<B, 1, Int>>,
        name: &str,
    ) -> Result<Tensor<B, 2>, Error> {
        let ids = ids.ok_or_else(|| Error::MissingMetadata(name.into()))?;
        let count = ids.dims()[0];

        if count == 0 {
            return Ok(Tensor::zeros([0, self.dim_output()], &ids.device()));
        }

        let id_max = ids.to_owned().max().into_scalar().elem::<i64>();
        let id_min = ids.to_owned().min().into_scalar().elem::<i64>();
        let id_count = self.num_embeddings();
        if id_min < 0 || id_max >= id_count as i64 {
            return Err(Error::Validation(
                name.into(),
                format!("in 0..{id_count}, but got {id_min}..={id_max}"),
            ));
        }

        Ok(self.forward(ids.to_owned()))
    }
}
