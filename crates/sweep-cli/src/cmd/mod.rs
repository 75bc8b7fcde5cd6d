pub mod cleanup;
pub mod completions;
pub mod init;
