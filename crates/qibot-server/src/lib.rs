//! HTTP transport for qibot: web chat, WhatsApp webhook, health and static files.

pub mod handlers;
pub mod server;
pub mod whatsapp;

pub use server::{AppState, CookieSettings, build_app, build_service, serve};
