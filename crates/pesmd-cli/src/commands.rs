pub mod list_configs;
pub mod simulate;
pub mod train;
pub mod visualize;
