pub mod check;
pub mod init;
pub mod progress;
pub mod serve;
pub mod taxonomy;
