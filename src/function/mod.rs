pub mod random;
pub mod tensor_extensions;
