pub mod chat;
pub mod generate;
pub mod health;
pub mod info;
pub mod memory;
pub mod summary;
