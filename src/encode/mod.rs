//! Feature encoders.

pub mod glo;
pub mod sinusoidal;
pub mod time;

pub use burn::{
    config::Config,
    module::Module,
    tensor::{backend::Backend, Int, Tensor, TensorData},
};
pub use glo::{GloEncoder, GloEncoderConfig};
pub use sinusoidal::{
    AnnealedSinusoidalEncoder, SinusoidalEncoder, SinusoidalEncoderConfig,
};
pub use time::{TimeEncoder, TimeEncoderConfig};
