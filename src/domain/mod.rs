// Domain layer: core models, business outcomes and ports (interfaces).

pub mod model;
pub mod outcome;
pub mod ports;
