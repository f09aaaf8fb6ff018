pub mod catalog;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod steps;
