//! Instrument Simulation Library
//!
//! This crate provides stand-ins for instruments so drivers can be exercised
//! without hardware:
//!
//! - **ScriptedCommunicator**: replays a fixed conversation and checks that
//!   the driver sent exactly the expected commands
//! - **VirtualCc1**: a stateful CC1 coincidence counter that answers in the
//!   dialect its firmware version implies
//!
//! # Example
//!
//! ```rust
//! use ik_comm::Communicator;
//! use ik_sim::VirtualCc1;
//!
//! let mut cc1 = VirtualCc1::new("v2.010").unwrap();
//! cc1.add_counts(0, 1200);
//!
//! assert_eq!(cc1.query("COUN:C1?", None).unwrap(), "1200");
//! assert_eq!(cc1.query("GATE?", None).unwrap(), "ON");
//! ```

pub mod cc1;
pub mod scripted;

pub use cc1::{VirtualCc1, VirtualCc1Config};
pub use scripted::{ScriptMismatch, ScriptedCommunicator};
