//! clinic-hub: real-time notification fan-out service for the clinic
//! operations backend.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod config;
pub mod db;
pub mod hub;
pub mod notify;
pub mod routes;
pub mod state;
