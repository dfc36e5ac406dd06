#![forbid(unsafe_code)]

pub mod analyze;
pub mod cache;
pub mod cli;
pub mod config;
pub mod detect;
pub mod dom;
pub mod error;
pub mod fetch;
pub mod highlight;
pub mod logging;
pub mod openai;
pub mod page;
pub mod score;
pub mod summarize;
