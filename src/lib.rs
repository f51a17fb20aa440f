pub mod analyzer;
pub mod config;
pub mod model;
pub mod parser;
pub mod source;
pub mod utils;
