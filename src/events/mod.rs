pub mod payloads;
pub mod router;
pub mod transport;
