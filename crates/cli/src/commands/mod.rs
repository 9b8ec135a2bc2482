pub mod data;
pub mod health;
pub mod models;
pub mod predict;
