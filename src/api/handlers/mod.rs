pub mod bus;
pub mod crew;
