pub mod delivery;
pub mod driver;
pub mod tracking;
pub mod vehicle;
pub mod window;
