//! Integration tests for the CC1 driver
//!
//! These tests drive the CC1 against:
//! - Scripted conversations, checking the exact wire text of both dialects
//! - The virtual counter, checking that settings actually stick
//! - Validation, checking that rejected values never reach the wire

use ik_drivers::{Cc1, Cc1Property, DriverError};
use ik_protocol::qubitekk::{Cc1Dialect, TriggerMode};
use ik_protocol::{FirmwareVersion, Quantity, ValidationError, Value};
use ik_sim::{ScriptedCommunicator, VirtualCc1, VirtualCc1Config};

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Build a script whose first exchange is the firmware query
    pub fn script(firmware: &str, commands: &[&str], replies: &[&str]) -> ScriptedCommunicator {
        let commands = std::iter::once("FIRM?").chain(commands.iter().copied());
        let replies = std::iter::once(firmware).chain(replies.iter().copied());
        ScriptedCommunicator::new(commands, replies)
    }

    /// Virtual counter running the given firmware
    pub fn virtual_cc1(firmware: &str) -> Cc1<VirtualCc1> {
        Cc1::new(VirtualCc1::new(firmware).unwrap()).unwrap()
    }
}

// ============================================================================
// Scripted Conversations
// ============================================================================

mod scripted_tests {
    use super::helpers::*;
    use super::*;

    #[test]
    fn test_channel_count() {
        let mut comm = script("v2.10", &["COUN:C1?"], &["20"]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert_eq!(
                cc1.channel(0).unwrap().count().unwrap(),
                Quantity::dimensionless(20.0)
            );
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_window() {
        let mut comm = script("v2.10", &["WIND?", ":WIND 7"], &["2", ""]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert_eq!(cc1.window().unwrap(), Quantity::ns(2.0));
            cc1.set_window(Quantity::ns(7.0)).unwrap();
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_window_out_of_range_sends_nothing() {
        let mut comm = script("v2.10", &[], &[]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            let err = cc1.set_window(Quantity::ns(10.0)).unwrap_err();
            assert!(err.is_value_error());
            let err = cc1.set_window(Quantity::ns(-1.0)).unwrap_err();
            assert!(err.is_value_error());
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_delay() {
        let mut comm = script("v2.10", &["DELA?", ":DELA 2"], &["8", ""]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert_eq!(cc1.delay().unwrap(), Quantity::ns(8.0));
            cc1.set_delay(Quantity::ns(2.0)).unwrap();
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_invalid_delay_sends_nothing() {
        let mut comm = script("v2.10", &[], &[]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert!(matches!(
                cc1.set_delay(Quantity::ns(-1.0)),
                Err(DriverError::Validation(ValidationError::OutOfRange { .. }))
            ));
            assert!(matches!(
                cc1.set_delay(Quantity::ns(1.0)),
                Err(DriverError::Validation(ValidationError::NotMultiple { .. }))
            ));
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_dwell_time() {
        let mut comm = script("v2.01", &["DWEL?", ":DWEL 2"], &["8", ""]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert_eq!(cc1.dwell_time().unwrap(), Quantity::s(8.0));
            cc1.set_dwell_time(Quantity::s(2.0)).unwrap();
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_negative_dwell_time_sends_nothing() {
        let mut comm = script("v2.10", &[], &[]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert!(cc1.set_dwell_time(Quantity::s(-1.0)).unwrap_err().is_value_error());
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_firmware_forms() {
        let mut comm = script("1.2.3", &[], &[]);
        {
            let cc1 = Cc1::new(&mut comm).unwrap();
            assert_eq!(cc1.firmware(), FirmwareVersion::new(1, 2, 3));
            assert_eq!(cc1.dialect(), Cc1Dialect::Legacy);
        }
        comm.finish().unwrap();

        let mut comm = script("v1", &[], &[]);
        {
            let cc1 = Cc1::new(&mut comm).unwrap();
            assert_eq!(cc1.firmware(), FirmwareVersion::new(1, 0, 0));
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_gate_modern() {
        let mut comm = script("v2.10", &["GATE?", ":GATE:ON", ":GATE:OFF"], &["ON", "", ""]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert!(cc1.gate().unwrap());
            cc1.set_gate(true).unwrap();
            cc1.set_gate(false).unwrap();
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_gate_legacy() {
        let mut comm = script("v2.001", &["GATE?", ":GATE 1", ":GATE 0"], &["1", "", ""]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert!(cc1.gate().unwrap());
            cc1.set_gate(true).unwrap();
            cc1.set_gate(false).unwrap();
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_subtract_modern() {
        let mut comm = script(
            "v2.010",
            &["SUBT?", ":SUBT:ON", ":SUBT:OFF"],
            &["ON", "", ""],
        );
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert!(cc1.subtract().unwrap());
            cc1.set_subtract(true).unwrap();
            cc1.set_subtract(false).unwrap();
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_trigger_modern() {
        let mut comm = script(
            "v2.10",
            &["TRIG?", ":TRIG:MODE CONT", ":TRIG:MODE STOP"],
            &["MODE STOP", "", ""],
        );
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert_eq!(cc1.trigger().unwrap(), TriggerMode::StartStop);
            cc1.set_trigger(TriggerMode::Continuous).unwrap();
            cc1.set_trigger(TriggerMode::StartStop).unwrap();
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_trigger_legacy() {
        let mut comm = script("v2.001", &["TRIG?", ":TRIG 0", ":TRIG 1"], &["1", "", ""]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert_eq!(cc1.trigger().unwrap(), TriggerMode::StartStop);
            cc1.set_trigger(TriggerMode::Continuous).unwrap();
            cc1.set_trigger(TriggerMode::StartStop).unwrap();
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_clear_counts_reads_no_ack() {
        let mut comm = script("v2.10", &["CLEA"], &[]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            cc1.clear_counts().unwrap();
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_unrecognized_switch_reply() {
        let mut comm = script("v2.10", &["GATE?"], &["1"]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            assert!(matches!(cc1.gate(), Err(DriverError::Parse(_))));
        }
        comm.finish().unwrap();
    }
}

// ============================================================================
// Name-based Access
// ============================================================================

mod property_tests {
    use super::helpers::*;
    use super::*;

    #[test]
    fn test_wrong_type_for_switch() {
        let mut comm = script("v2.10", &[], &[]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            let blo = Value::Text("blo".into());
            assert!(cc1.set(Cc1Property::Gate, &blo).unwrap_err().is_type_error());
            assert!(cc1.set(Cc1Property::Subtract, &blo).unwrap_err().is_type_error());
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_unknown_trigger_mode_is_value_error() {
        let mut comm = script("v2.10", &[], &[]);
        {
            let mut cc1 = Cc1::new(&mut comm).unwrap();
            let err = cc1
                .set(Cc1Property::Trigger, &Value::Text("blo".into()))
                .unwrap_err();
            assert!(err.is_value_error());
        }
        comm.finish().unwrap();
    }

    #[test]
    fn test_read_only_properties() {
        let mut cc1 = virtual_cc1("v2.010");
        assert!(matches!(
            cc1.set(Cc1Property::Firmware, &Value::Text("v3".into())),
            Err(DriverError::Validation(ValidationError::ReadOnly("firmware")))
        ));
        assert!(matches!(
            cc1.set(Cc1Property::Count(0), &Value::Int(0)),
            Err(DriverError::Validation(ValidationError::ReadOnly("count")))
        ));
    }

    #[test]
    fn test_get_every_property() {
        let mut cc1 = virtual_cc1("v2.010");
        for prop in Cc1Property::all() {
            cc1.get(prop).unwrap();
        }
        assert_eq!(
            cc1.get(Cc1Property::Firmware).unwrap(),
            Value::Version(FirmwareVersion::new(2, 10, 0))
        );
        assert_eq!(
            cc1.get(Cc1Property::Trigger).unwrap(),
            Value::Text("continuous".into())
        );
    }

    #[test]
    fn test_set_by_literal() {
        let mut cc1 = virtual_cc1("v2.001");
        cc1.set(Cc1Property::Window, &Value::parse_literal("5")).unwrap();
        cc1.set(Cc1Property::Gate, &Value::parse_literal("false")).unwrap();
        cc1.set(Cc1Property::Trigger, &Value::parse_literal("start_stop"))
            .unwrap();

        let sim = cc1.comm();
        assert_eq!(sim.window_ns(), 5);
        assert!(!sim.gate());
        assert_eq!(sim.trigger(), TriggerMode::StartStop);
    }
}

// ============================================================================
// Virtual Counter
// ============================================================================

mod virtual_tests {
    use super::helpers::*;
    use super::*;

    #[test]
    fn test_settings_stick_in_both_dialects() {
        for firmware in ["v2.001", "v2.010"] {
            let mut cc1 = virtual_cc1(firmware);
            cc1.set_gate(false).unwrap();
            cc1.set_subtract(true).unwrap();
            cc1.set_trigger(TriggerMode::StartStop).unwrap();
            cc1.set_delay(Quantity::ns(6.0)).unwrap();
            cc1.set_dwell_time(Quantity::s(3.0)).unwrap();

            assert!(!cc1.gate().unwrap());
            assert!(cc1.subtract().unwrap());
            assert_eq!(cc1.trigger().unwrap(), TriggerMode::StartStop);
            assert_eq!(cc1.delay().unwrap(), Quantity::ns(6.0));
            assert_eq!(cc1.dwell_time().unwrap(), Quantity::s(3.0));
        }
    }

    #[test]
    fn test_clear_counts() {
        let mut sim = VirtualCc1::new("v2.010").unwrap();
        sim.add_counts(0, 12);
        sim.add_counts(2, 4);
        let mut cc1 = Cc1::new(sim).unwrap();
        assert_eq!(
            cc1.channel(2).unwrap().count().unwrap(),
            Quantity::dimensionless(4.0)
        );

        cc1.clear_counts().unwrap();
        for i in cc1.channels() {
            assert_eq!(
                cc1.channel(i).unwrap().count().unwrap(),
                Quantity::dimensionless(0.0)
            );
        }
    }

    #[test]
    fn test_channel_out_of_range() {
        let mut cc1 = virtual_cc1("v2.010");
        assert!(matches!(
            cc1.channel(3),
            Err(DriverError::Validation(ValidationError::ChannelOutOfRange { index: 3, count: 3 }))
        ));
    }

    #[test]
    fn test_firmware_retried_while_unknown() {
        let config = VirtualCc1Config {
            unknown_firmware_replies: 2,
            ..Default::default()
        };
        let cc1 = Cc1::new(VirtualCc1::from_config(config).unwrap()).unwrap();
        assert_eq!(cc1.firmware(), FirmwareVersion::new(2, 10, 0));
        let firm_queries = cc1
            .comm()
            .command_log()
            .iter()
            .filter(|c| c.as_str() == "FIRM?")
            .count();
        assert_eq!(firm_queries, 3);
    }

    #[test]
    fn test_firmware_gives_up_after_attempts() {
        let config = VirtualCc1Config {
            unknown_firmware_replies: 10,
            ..Default::default()
        };
        let result = Cc1::new(VirtualCc1::from_config(config).unwrap());
        assert!(matches!(result, Err(DriverError::Parse(_))));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

mod proptest_tests {
    use super::helpers::*;
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn window_roundtrip(ns in 0u32..=7) {
            let mut cc1 = virtual_cc1("v2.010");
            cc1.set_window(Quantity::ns(ns as f64)).unwrap();
            prop_assert_eq!(cc1.window().unwrap(), Quantity::ns(ns as f64));
        }

        #[test]
        fn even_delays_accepted(half in 0u32..=7) {
            let mut cc1 = virtual_cc1("v2.001");
            let ns = half * 2;
            cc1.set_delay(Quantity::ns(ns as f64)).unwrap();
            prop_assert_eq!(cc1.comm().delay_ns(), ns);
        }

        #[test]
        fn oversized_window_rejected(ns in 8u32..1000) {
            let mut cc1 = virtual_cc1("v2.010");
            prop_assert!(cc1.set_window(Quantity::ns(ns as f64)).is_err());
            prop_assert!(!cc1.comm().command_log().iter().any(|c| c.starts_with(":WIND")));
            prop_assert_eq!(cc1.comm().window_ns(), 3);
        }
    }
}
