//! Library crate for hashprobe: SHA-1 wordlist password recovery and a
//! service-aware TCP port probe.
pub mod cracker;
pub mod error;
pub mod resolve;
pub mod scanner;
pub mod services;
pub mod types;
