pub mod architecture;
pub mod potential;
pub mod sample;
