// Domain layer: extraction models and ports (interfaces).

pub mod model;
pub mod ports;
