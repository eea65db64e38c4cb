pub mod algorithm;
pub mod args;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod fs_util;
pub mod model;
pub mod operation;
pub mod resolver;
pub mod scep;
pub mod utils;

pub use error::{Error, Result};
pub use resolver::resolve;
