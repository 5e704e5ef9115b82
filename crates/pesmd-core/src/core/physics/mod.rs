pub mod constants;
pub mod transform;
