/// Default number of flattened samples per scene function call.
pub const CHUNK_SIZE_DEFAULT: usize = 1 << 16;
/// Lower bound of the depth-to-opacity ratio before taking its reciprocal.
pub const DISPARITY_EPSILON: f32 = 1e-10;
/// Distance assigned to the last segment of every ray.
pub const DISTANCE_SENTINEL: f32 = 1e10;
/// Added to every interior weight before normalizing it into a PDF.
pub const PDF_EPSILON: f32 = 1e-5;
/// CDF brackets narrower than this are treated as having unit width.
pub const CDF_BRACKET_EPSILON: f32 = 1e-5;
/// Added to the survival probability of every segment.
pub const TRANSMITTANCE_EPSILON: f32 = 1e-10;
/// Step of the central finite differences for warp Jacobians.
pub const JACOBIAN_STEP: f32 = 1e-3;

/// Random stream offsets of each draw site in deterministic mode.
pub const SEED_STREAM_STRATIFIED: u64 = 0x5354;
pub const SEED_STREAM_NOISE_COARSE: u64 = 0x4E43;
pub const SEED_STREAM_NOISE_FINE: u64 = 0x4E46;
pub const SEED_STREAM_RESAMPLE: u64 = 0x5253;
