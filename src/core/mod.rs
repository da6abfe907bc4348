pub mod audio;
pub mod clock;
pub mod fixed;
pub mod input;
pub mod random;
