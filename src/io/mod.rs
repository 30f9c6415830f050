pub mod process;
pub mod progress;
