pub mod history;
pub mod init;
pub mod run;
