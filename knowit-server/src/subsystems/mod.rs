pub mod chat;
pub mod uploads;
