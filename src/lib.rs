pub mod access;
pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod feed;
pub mod hire;
pub mod models;
pub mod protocol;
pub mod registry;
pub mod session;
pub mod state;
pub mod store;
pub mod web;
