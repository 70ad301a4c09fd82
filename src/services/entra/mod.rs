pub mod client;

pub use client::{EntraClient, EntraError, EntraToken, OnBehalfOf};
