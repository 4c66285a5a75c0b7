pub mod config;
pub mod lookup;
pub mod progress;
pub mod run;
