//! API route handlers

pub mod pipeline;
