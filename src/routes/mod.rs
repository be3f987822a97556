//! HTTP routes

pub mod crops;
pub mod health;
pub mod pdfs;
