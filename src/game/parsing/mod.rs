pub mod blob;
pub mod fnf;
