pub mod bow;
pub mod cli;
pub mod config;
pub mod features;
pub mod index;
pub mod knn;
pub mod matrix;
pub mod utils;
pub mod vote;

pub use config::Opts;
pub use index::{FeatureIndex, FeatureIndexBuilder};
