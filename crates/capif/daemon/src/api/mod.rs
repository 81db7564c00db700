//! API layer for capif-daemon

pub mod rest;

pub use rest::create_router;
