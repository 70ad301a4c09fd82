/*
 * Responsibility
 * - crate の公開モジュール (bin と tests/ から参照する)
 */
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
