// Domain layer: account/payment-method models and the ports the binding talks through.

pub mod model;
pub mod ports;
