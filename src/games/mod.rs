pub mod catalog;
pub mod sandbox;
