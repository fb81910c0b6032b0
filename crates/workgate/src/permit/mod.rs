//! Permit gate for bounded concurrent admission.
//!
//! Workers acquire a permit before entering their work loop. The permit is
//! an RAII guard: dropping it returns the underlying slot token to the gate
//! and wakes the next waiter, so release-on-every-path is structural rather
//! than a caller obligation.

mod gate;

pub use gate::{AcquireError, GateError, Permit, PermitGate};
