pub mod cancel;
pub mod config;
pub mod init;
pub mod report;
pub mod results;
pub mod run;
pub mod status;
