//! Library side of the `order-risk` command: logging, option resolution
//! and batch output.

pub mod config;
pub mod logging;
pub mod output;
