pub mod prices;
pub mod system;
