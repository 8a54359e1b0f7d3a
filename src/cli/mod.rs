pub mod analyse;
pub mod command;
pub mod info;
pub mod progress;
pub mod trace;
