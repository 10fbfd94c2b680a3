#![allow(dead_code, non_snake_case, non_upper_case_globals)]

pub mod error;
pub mod config;
pub mod hilbert;
pub mod symbolic;
pub mod couplings;
pub mod hamiltonian;
pub mod decay;

pub use error::{ Error, Result };
pub use config::ExtensionConfig;
