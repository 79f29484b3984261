pub mod message;
pub mod mime;
