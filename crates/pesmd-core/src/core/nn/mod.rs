pub mod activation;
pub mod loss;
pub mod network;
