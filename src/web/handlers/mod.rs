//! Route handlers for the JSON API.

pub mod health;
pub mod notify;
pub mod todos;
