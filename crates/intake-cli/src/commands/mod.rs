pub mod answers;
pub mod common;
pub mod completions;
pub mod config;
pub mod init;
pub mod media;
pub mod photos;
pub mod question;
pub mod submit;
