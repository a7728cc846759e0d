#[macro_use] extern crate lazy_static;

pub mod geo;
pub mod read;
