#![forbid(unsafe_code)]

pub mod catalog;
pub mod chapter;
pub mod cli;
pub mod commands;
pub mod fetch;
pub mod formats;
pub mod library;
pub mod logging;
pub mod pagination;
pub mod reader;
pub mod session;
