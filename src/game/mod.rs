pub mod camera;
pub mod character;
pub mod chart;
pub mod effects;
pub mod gameplay;
pub mod hooks;
pub mod judgment;
pub mod life;
pub mod parsing;
pub mod replay;
pub mod singer;
pub mod stage;
