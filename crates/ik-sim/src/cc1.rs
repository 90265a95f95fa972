//! Virtual Qubitekk CC1
//!
//! A simulated coincidence counter that keeps its settings and counts, and
//! speaks the dialect its firmware version implies. Set commands are
//! acknowledged with an empty line, `CLEA` gets no reply, and commands it
//! does not understand get no reply either, so the caller's read times out
//! the way it would against real hardware.

use std::time::Duration;

use ik_comm::{Address, CommError, Communicator};
use ik_protocol::qubitekk::{Cc1Command, Cc1Dialect, TriggerMode, CHANNEL_COUNT};
use ik_protocol::{FirmwareVersion, ParseError};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// Configuration for creating a virtual CC1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualCc1Config {
    /// Firmware string reported by `FIRM?`
    pub firmware: String,
    /// Initial coincidence window in nanoseconds
    pub window_ns: u32,
    /// Initial delay in nanoseconds
    pub delay_ns: u32,
    /// Initial dwell time in seconds
    pub dwell_s: u32,
    /// Initial gate state
    pub gate: bool,
    /// Initial subtraction state
    pub subtract: bool,
    /// Initial trigger mode
    pub trigger: TriggerMode,
    /// How many `FIRM?` queries are answered with "Unknown command" first
    pub unknown_firmware_replies: u32,
}

impl Default for VirtualCc1Config {
    fn default() -> Self {
        Self {
            firmware: "v2.010".to_string(),
            window_ns: 3,
            delay_ns: 0,
            dwell_s: 1,
            gate: true,
            subtract: false,
            trigger: TriggerMode::Continuous,
            unknown_firmware_replies: 0,
        }
    }
}

/// A simulated CC1 reachable through the [`Communicator`] trait
#[derive(Debug)]
pub struct VirtualCc1 {
    config: VirtualCc1Config,
    dialect: Cc1Dialect,
    counts: [u64; CHANNEL_COUNT],
    input: String,
    output: String,
    log: Vec<String>,
    terminator: String,
    timeout: Duration,
    closed: bool,
}

impl VirtualCc1 {
    /// Create a counter reporting `firmware`, other settings default
    pub fn new(firmware: &str) -> Result<Self, ParseError> {
        Self::from_config(VirtualCc1Config {
            firmware: firmware.to_string(),
            ..VirtualCc1Config::default()
        })
    }

    /// Create a counter from configuration
    pub fn from_config(config: VirtualCc1Config) -> Result<Self, ParseError> {
        let version = FirmwareVersion::parse(&config.firmware)?;
        let dialect = Cc1Dialect::for_firmware(version);
        debug!("Virtual CC1 with firmware {} ({:?})", config.firmware, dialect);
        Ok(Self {
            config,
            dialect,
            counts: [0; CHANNEL_COUNT],
            input: String::new(),
            output: String::new(),
            log: Vec::new(),
            terminator: "\n".to_string(),
            timeout: Duration::from_millis(100),
            closed: false,
        })
    }

    /// Dialect this counter speaks
    pub fn dialect(&self) -> Cc1Dialect {
        self.dialect
    }

    pub fn window_ns(&self) -> u32 {
        self.config.window_ns
    }

    pub fn delay_ns(&self) -> u32 {
        self.config.delay_ns
    }

    pub fn dwell_s(&self) -> u32 {
        self.config.dwell_s
    }

    pub fn gate(&self) -> bool {
        self.config.gate
    }

    pub fn subtract(&self) -> bool {
        self.config.subtract
    }

    pub fn trigger(&self) -> TriggerMode {
        self.config.trigger
    }

    /// Current count on a 0-based channel
    pub fn counts(&self, channel: usize) -> u64 {
        self.counts.get(channel).copied().unwrap_or(0)
    }

    /// Register detection events on a 0-based channel
    pub fn add_counts(&mut self, channel: usize, n: u64) {
        if let Some(c) = self.counts.get_mut(channel) {
            *c += n;
        }
    }

    /// Every command line received, in order
    pub fn command_log(&self) -> &[String] {
        &self.log
    }

    /// Forget the command log
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn respond(&mut self, reply: &str) {
        trace!("virtual CC1 << {:?}", reply);
        self.output.push_str(reply);
        let terminator = self.terminator.clone();
        self.output.push_str(&terminator);
    }

    fn handle_line(&mut self, line: &str) {
        let line = line.trim_end_matches('\r');
        self.log.push(line.to_string());

        if let Some(reply) = self.answer_query(line) {
            self.respond(&reply);
            return;
        }
        if line == "CLEA" {
            self.counts = [0; CHANNEL_COUNT];
            return;
        }
        if self.apply_set(line) {
            self.respond("");
            return;
        }
        warn!("Virtual CC1 ignoring unknown command {:?}", line);
    }

    fn answer_query(&mut self, line: &str) -> Option<String> {
        let d = self.dialect;
        let reply = match line {
            "FIRM?" => {
                if self.config.unknown_firmware_replies > 0 {
                    self.config.unknown_firmware_replies -= 1;
                    "Unknown command".to_string()
                } else {
                    self.config.firmware.clone()
                }
            }
            "WIND?" => self.config.window_ns.to_string(),
            "DELA?" => self.config.delay_ns.to_string(),
            "DWEL?" => self.config.dwell_s.to_string(),
            "GATE?" => d.switch_reply(self.config.gate).to_string(),
            "SUBT?" => d.switch_reply(self.config.subtract).to_string(),
            "TRIG?" => d.trigger_reply(self.config.trigger).to_string(),
            _ => {
                let channel = line
                    .strip_prefix("COUN:C")?
                    .strip_suffix('?')?
                    .parse::<usize>()
                    .ok()?;
                if channel == 0 || channel > CHANNEL_COUNT {
                    return None;
                }
                self.counts[channel - 1].to_string()
            }
        };
        Some(reply)
    }

    fn apply_set(&mut self, line: &str) -> bool {
        let d = self.dialect;
        let numeric = |prefix: &str| line.strip_prefix(prefix).and_then(|v| v.trim().parse::<u32>().ok());

        if let Some(v) = numeric(":WIND ") {
            self.config.window_ns = v;
        } else if let Some(v) = numeric(":DELA ") {
            self.config.delay_ns = v;
        } else if let Some(v) = numeric(":DWEL ") {
            self.config.dwell_s = v;
        } else if let Some(on) = [true, false]
            .into_iter()
            .find(|&on| line == d.encode(&Cc1Command::Gate(Some(on))))
        {
            self.config.gate = on;
        } else if let Some(on) = [true, false]
            .into_iter()
            .find(|&on| line == d.encode(&Cc1Command::Subtract(Some(on))))
        {
            self.config.subtract = on;
        } else if let Some(mode) = [TriggerMode::Continuous, TriggerMode::StartStop]
            .into_iter()
            .find(|&mode| line == d.encode(&Cc1Command::Trigger(Some(mode))))
        {
            self.config.trigger = mode;
        } else {
            return false;
        }
        true
    }
}

impl Communicator for VirtualCc1 {
    fn address(&self) -> Address {
        Address::Loopback(format!("virtual-cc1 {}", self.config.firmware))
    }

    fn terminator(&self) -> &str {
        &self.terminator
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), CommError> {
        self.timeout = timeout;
        Ok(())
    }

    fn read(&mut self, size: Option<usize>) -> Result<String, CommError> {
        if self.closed {
            return Err(CommError::Closed);
        }
        let msg = match size {
            Some(n) => {
                if self.output.is_empty() {
                    return Err(CommError::Timeout(self.timeout));
                }
                let mut end = n.min(self.output.len());
                while !self.output.is_char_boundary(end) {
                    end -= 1;
                }
                self.output.drain(..end).collect()
            }
            None => {
                let pos = self
                    .output
                    .find(self.terminator.as_str())
                    .ok_or(CommError::Timeout(self.timeout))?;
                let msg: String = self.output.drain(..pos).collect();
                self.output.drain(..self.terminator.len());
                msg
            }
        };
        Ok(msg)
    }

    fn write(&mut self, msg: &str) -> Result<(), CommError> {
        if self.closed {
            return Err(CommError::Closed);
        }
        trace!("virtual CC1 >> {:?}", msg);
        self.input.push_str(msg);
        while let Some(pos) = self.input.find(self.terminator.as_str()) {
            let line: String = self.input.drain(..pos).collect();
            self.input.drain(..self.terminator.len());
            self.handle_line(&line);
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modern_dialect_replies() {
        let mut cc1 = VirtualCc1::new("v2.010").unwrap();
        assert_eq!(cc1.dialect(), Cc1Dialect::Modern);
        assert_eq!(cc1.query("FIRM?", None).unwrap(), "v2.010");
        assert_eq!(cc1.query("GATE?", None).unwrap(), "ON");
        assert_eq!(cc1.query("TRIG?", None).unwrap(), "MODE CONT");

        assert_eq!(cc1.query(":GATE:OFF", None).unwrap(), "");
        assert!(!cc1.gate());
        assert_eq!(cc1.query(":TRIG:MODE STOP", None).unwrap(), "");
        assert_eq!(cc1.trigger(), TriggerMode::StartStop);
        assert_eq!(cc1.query("TRIG?", None).unwrap(), "MODE STOP");
    }

    #[test]
    fn test_legacy_dialect_replies() {
        let mut cc1 = VirtualCc1::new("v2.001").unwrap();
        assert_eq!(cc1.dialect(), Cc1Dialect::Legacy);
        assert_eq!(cc1.query("GATE?", None).unwrap(), "1");
        assert_eq!(cc1.query(":SUBT 1", None).unwrap(), "");
        assert!(cc1.subtract());
        assert_eq!(cc1.query(":TRIG 1", None).unwrap(), "");
        assert_eq!(cc1.query("TRIG?", None).unwrap(), "1");
    }

    #[test]
    fn test_wrong_dialect_command_is_ignored() {
        let mut cc1 = VirtualCc1::new("v2.001").unwrap();
        cc1.sendcmd(":GATE:OFF").unwrap();
        assert!(cc1.gate());
        assert!(cc1.read(None).unwrap_err().is_timeout());
    }

    #[test]
    fn test_numeric_settings() {
        let mut cc1 = VirtualCc1::new("v2.010").unwrap();
        cc1.query(":WIND 7", None).unwrap();
        cc1.query(":DELA 4", None).unwrap();
        cc1.query(":DWEL 2", None).unwrap();
        assert_eq!(cc1.query("WIND?", None).unwrap(), "7");
        assert_eq!(cc1.query("DELA?", None).unwrap(), "4");
        assert_eq!(cc1.query("DWEL?", None).unwrap(), "2");
    }

    #[test]
    fn test_counts_and_clear() {
        let mut cc1 = VirtualCc1::new("v2.010").unwrap();
        cc1.add_counts(0, 10);
        cc1.add_counts(2, 5);
        assert_eq!(cc1.query("COUN:C1?", None).unwrap(), "10");
        assert_eq!(cc1.query("COUN:C3?", None).unwrap(), "5");

        cc1.sendcmd("CLEA").unwrap();
        assert!(cc1.read(None).unwrap_err().is_timeout());
        assert_eq!(cc1.counts(0), 0);
        assert_eq!(cc1.command_log().last().unwrap(), "CLEA");
    }

    #[test]
    fn test_unknown_firmware_reply() {
        let mut cc1 = VirtualCc1::from_config(VirtualCc1Config {
            unknown_firmware_replies: 1,
            ..VirtualCc1Config::default()
        })
        .unwrap();
        assert_eq!(cc1.query("FIRM?", None).unwrap(), "Unknown command");
        assert_eq!(cc1.query("FIRM?", None).unwrap(), "v2.010");
    }

    #[test]
    fn test_invalid_firmware_config() {
        assert!(VirtualCc1::new("banana").is_err());
    }

    #[test]
    fn test_config_from_json() {
        let config: VirtualCc1Config =
            serde_json::from_str(r#"{"firmware": "v2.001", "trigger": "start_stop"}"#).unwrap();
        let cc1 = VirtualCc1::from_config(config).unwrap();
        assert_eq!(cc1.dialect(), Cc1Dialect::Legacy);
        assert_eq!(cc1.trigger(), TriggerMode::StartStop);
        assert_eq!(cc1.window_ns(), 3);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn counts_accumulate_per_channel(adds in prop::collection::vec((0usize..3, 0u64..1000), 0..20)) {
                let mut cc1 = VirtualCc1::new("v2.010").unwrap();
                let mut expected = [0u64; CHANNEL_COUNT];
                for (ch, n) in adds {
                    cc1.add_counts(ch, n);
                    expected[ch] += n;
                }
                for (ch, total) in expected.iter().enumerate() {
                    let reply = cc1.query(&format!("COUN:C{}?", ch + 1), None).unwrap();
                    prop_assert_eq!(reply, total.to_string());
                }
            }
        }
    }
}
