//! Order document and its status state machine.

mod document;
mod status;

pub use document::{DeliveryDetails, Order, OrderLine};
pub use status::OrderStatus;
