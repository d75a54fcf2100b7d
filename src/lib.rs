pub mod app;
pub mod cli;
pub mod config;
pub mod fuzzer;
pub mod output;
pub mod runner;
pub mod utils;

#[cfg(test)]
mod tests;
