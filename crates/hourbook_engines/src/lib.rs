#![forbid(unsafe_code)]

pub mod config;
pub mod pdf;
pub mod render;
