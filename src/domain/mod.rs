// Domain layer: models, the booking life-cycle and ports. No HTTP in here.

pub mod booking_state;
pub mod model;
pub mod ports;
