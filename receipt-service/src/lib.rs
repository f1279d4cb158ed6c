//! receipt-service: recurring rent-receipt generation and lifecycle.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
