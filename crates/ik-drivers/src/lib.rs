//! Instrument Drivers
//!
//! Drivers own a [`Communicator`](ik_comm::Communicator) and turn typed
//! property access into wire traffic:
//!
//! - [`Cc1`]: Qubitekk CC1 coincidence counter. The firmware version is read
//!   once at construction and selects the command dialect for gate,
//!   subtract and trigger.
//! - [`TopMode`]: Toptica TopMode laser, with per-head access through
//!   [`Laser`].
//!
//! Values are validated before anything is written, so a rejected setting
//! leaves the instrument untouched.
//!
//! # Example
//!
//! ```rust
//! use ik_drivers::Cc1;
//! use ik_protocol::Quantity;
//! use ik_sim::VirtualCc1;
//!
//! let mut cc1 = Cc1::new(VirtualCc1::new("v2.010").unwrap()).unwrap();
//! cc1.set_window(Quantity::ns(5.0)).unwrap();
//! assert_eq!(cc1.window().unwrap(), Quantity::ns(5.0));
//! ```

pub mod error;
pub mod qubitekk;
pub mod toptica;

pub use error::DriverError;
pub use qubitekk::{Cc1, Cc1Property, Channel};
pub use toptica::{Laser, TopMode};
