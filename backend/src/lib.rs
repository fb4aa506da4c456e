//! Backend for the house marketplace: listing categories with cursor
//! pagination, sign-in and sign-up, and profile editing.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod platform;
pub mod routes;
pub mod schema;
pub mod seed;
pub mod views;
