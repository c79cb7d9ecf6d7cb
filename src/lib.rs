pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod pdf;
pub mod report;
pub mod session;
pub mod web;

pub use error::{AppError, Result};
