// Adapters layer: concrete implementations of the processor and account store ports.

pub mod memory;
pub mod stripe;
