pub mod chat;
pub mod health;
pub mod security;
pub mod whatsapp;
