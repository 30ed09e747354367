// Domain layer: ward models and the ports the analysis depends on.

pub mod model;
pub mod ports;
