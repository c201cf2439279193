#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Missing fine scene field: num_fine_samples is {0}, but no fine field is given")]
    MissingFineField(usize),

    #[error("Missing metadata: {0} should be given for every ray")]
    MissingMetadata(String),

    #[error("Mismatched shape: {0} should be {1}, but got {2}")]
    MismatchedShape(String, String, String),

    #[error("Validation Error: {0} should be {1}")]
    Validation(String, String),
}
