pub mod assignment;
pub mod availability;
pub mod lifecycle;
