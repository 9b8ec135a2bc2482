//! HTTP front end for the maternal health prediction service

pub mod api;
pub mod config;
