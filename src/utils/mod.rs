pub mod logger;
pub mod process;
