//! Qubitekk CC1 Coincidence Counter Protocol
//!
//! The CC1 speaks newline-terminated SCPI-like commands. Queries end in `?`,
//! set commands start with `:`.
//!
//! # Dialects
//!
//! Firmware up to 2.1 and firmware from 2.2 on disagree on how switches and
//! the trigger mode are written:
//!
//! | Field   | Legacy (< 2.2)       | Modern (>= 2.2)              |
//! |---------|----------------------|------------------------------|
//! | gate    | `:GATE 1` / `:GATE 0` | `:GATE:ON` / `:GATE:OFF`     |
//! | trigger | `:TRIG 0` / `:TRIG 1` | `:TRIG:MODE CONT` / `:TRIG:MODE STOP` |
//!
//! Replies follow the same split: a legacy unit reports a switch as `1`/`0`
//! and the trigger as `0`/`1`, a modern unit reports `ON`/`OFF` and
//! `MODE CONT`/`MODE STOP`.
//!
//! # Common Commands
//! - `FIRM?` - Firmware version
//! - `COUN:C<n>?` - Counts on channel `n` (1-based)
//! - `WIND?` / `DELA?` / `DWEL?` - Window, delay, dwell time
//! - `CLEA` - Clear all counts (no reply)

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::error::{ParseError, ValidationError};
use crate::firmware::FirmwareVersion;

/// Number of input channels on the CC1
pub const CHANNEL_COUNT: usize = 3;

/// First firmware version that speaks the modern dialect
pub const MODERN_DIALECT_MIN: FirmwareVersion = FirmwareVersion::new(2, 2, 0);

/// Command dialect, selected once per session from the firmware version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Cc1Dialect {
    /// Numeric switches and inverted numeric trigger encoding
    Legacy,
    /// `:FIELD:ON`/`:FIELD:OFF` switches and named trigger modes
    Modern,
}

/// Trigger mode of the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TriggerMode {
    /// Count continuously
    Continuous,
    /// Count between start and stop triggers
    StartStop,
}

impl TriggerMode {
    /// Returns the snake_case name of the mode
    pub fn name(&self) -> &'static str {
        match self {
            TriggerMode::Continuous => "continuous",
            TriggerMode::StartStop => "start_stop",
        }
    }
}

impl fmt::Display for TriggerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TriggerMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "continuous" => Ok(TriggerMode::Continuous),
            "start_stop" => Ok(TriggerMode::StartStop),
            other => Err(ValidationError::InvalidEnum {
                field: "trigger mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Boolean fields that share the switch encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Switch {
    /// Gate mode
    Gate,
    /// Accidental subtraction
    Subtract,
}

impl Switch {
    /// Wire mnemonic of the field
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Switch::Gate => "GATE",
            Switch::Subtract => "SUBT",
        }
    }

    /// Human-readable field name
    pub fn name(&self) -> &'static str {
        match self {
            Switch::Gate => "gate",
            Switch::Subtract => "subtract",
        }
    }
}

/// CC1 protocol command
///
/// `None` payloads are queries, `Some` payloads are set commands. Values are
/// already validated and expressed in wire units (ns for window and delay,
/// seconds for dwell time).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cc1Command {
    /// Firmware version query: FIRM?
    Firmware,
    /// Count query for a 0-based channel index: COUN:C1?
    Count { channel: usize },
    /// Coincidence window: WIND? / :WIND 7
    Window(Option<u32>),
    /// Channel delay: DELA? / :DELA 2
    Delay(Option<u32>),
    /// Dwell time: DWEL? / :DWEL 2
    DwellTime(Option<u32>),
    /// Gate switch: GATE? / dialect dependent
    Gate(Option<bool>),
    /// Subtraction switch: SUBT? / dialect dependent
    Subtract(Option<bool>),
    /// Trigger mode: TRIG? / dialect dependent
    Trigger(Option<TriggerMode>),
    /// Clear counts: CLEA
    Clear,
}

impl Cc1Command {
    /// Returns true if the instrument answers this command with a value
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Self::Firmware
                | Self::Count { .. }
                | Self::Window(None)
                | Self::Delay(None)
                | Self::DwellTime(None)
                | Self::Gate(None)
                | Self::Subtract(None)
                | Self::Trigger(None)
        )
    }

    /// Returns true if this command changes a setting (and is acknowledged)
    pub fn is_set(&self) -> bool {
        !self.is_query() && *self != Self::Clear
    }
}

impl Cc1Dialect {
    /// Select the dialect for a firmware version
    pub fn for_firmware(version: FirmwareVersion) -> Self {
        let dialect = if version >= MODERN_DIALECT_MIN {
            Cc1Dialect::Modern
        } else {
            Cc1Dialect::Legacy
        };
        debug!("CC1 firmware {} uses {:?} dialect", version, dialect);
        dialect
    }

    /// Encode a command to its wire text (no terminator)
    pub fn encode(self, cmd: &Cc1Command) -> String {
        match cmd {
            Cc1Command::Firmware => "FIRM?".to_string(),
            Cc1Command::Count { channel } => format!("COUN:C{}?", channel + 1),
            Cc1Command::Window(None) => "WIND?".to_string(),
            Cc1Command::Window(Some(ns)) => format!(":WIND {ns}"),
            Cc1Command::Delay(None) => "DELA?".to_string(),
            Cc1Command::Delay(Some(ns)) => format!(":DELA {ns}"),
            Cc1Command::DwellTime(None) => "DWEL?".to_string(),
            Cc1Command::DwellTime(Some(s)) => format!(":DWEL {s}"),
            Cc1Command::Gate(None) => "GATE?".to_string(),
            Cc1Command::Gate(Some(on)) => self.encode_switch(Switch::Gate, *on),
            Cc1Command::Subtract(None) => "SUBT?".to_string(),
            Cc1Command::Subtract(Some(on)) => self.encode_switch(Switch::Subtract, *on),
            Cc1Command::Trigger(None) => "TRIG?".to_string(),
            Cc1Command::Trigger(Some(mode)) => match self {
                Cc1Dialect::Modern => format!(":TRIG:MODE {}", self.trigger_token(*mode)),
                Cc1Dialect::Legacy => format!(":TRIG {}", self.trigger_token(*mode)),
            },
            Cc1Command::Clear => "CLEA".to_string(),
        }
    }

    fn encode_switch(self, switch: Switch, on: bool) -> String {
        match self {
            Cc1Dialect::Modern => format!(":{}:{}", switch.mnemonic(), self.switch_token(on)),
            Cc1Dialect::Legacy => format!(":{} {}", switch.mnemonic(), self.switch_token(on)),
        }
    }

    /// Literal used for a switch state in this dialect
    pub fn switch_token(self, on: bool) -> &'static str {
        match (self, on) {
            (Cc1Dialect::Modern, true) => "ON",
            (Cc1Dialect::Modern, false) => "OFF",
            (Cc1Dialect::Legacy, true) => "1",
            (Cc1Dialect::Legacy, false) => "0",
        }
    }

    /// Literal used for a trigger mode in set commands
    ///
    /// Legacy firmware encodes continuous as `0` and start/stop as `1`.
    pub fn trigger_token(self, mode: TriggerMode) -> &'static str {
        match (self, mode) {
            (Cc1Dialect::Modern, TriggerMode::Continuous) => "CONT",
            (Cc1Dialect::Modern, TriggerMode::StartStop) => "STOP",
            (Cc1Dialect::Legacy, TriggerMode::Continuous) => "0",
            (Cc1Dialect::Legacy, TriggerMode::StartStop) => "1",
        }
    }

    /// Parse a switch reply (`ON`/`OFF` or `1`/`0`)
    pub fn parse_switch(self, switch: Switch, reply: &str) -> Result<bool, ParseError> {
        let reply = reply.trim();
        if reply == self.switch_token(true) {
            Ok(true)
        } else if reply == self.switch_token(false) {
            Ok(false)
        } else {
            Err(ParseError::UnrecognizedReply {
                field: switch.name(),
                reply: reply.to_string(),
            })
        }
    }

    /// Parse a trigger mode reply (`MODE CONT`/`MODE STOP` or `0`/`1`)
    pub fn parse_trigger(self, reply: &str) -> Result<TriggerMode, ParseError> {
        let reply = reply.trim();
        let mode = match self {
            Cc1Dialect::Modern => match reply {
                "MODE CONT" => Some(TriggerMode::Continuous),
                "MODE STOP" => Some(TriggerMode::StartStop),
                _ => None,
            },
            Cc1Dialect::Legacy => match reply {
                "0" => Some(TriggerMode::Continuous),
                "1" => Some(TriggerMode::StartStop),
                _ => None,
            },
        };
        mode.ok_or_else(|| ParseError::UnrecognizedReply {
            field: "trigger mode",
            reply: reply.to_string(),
        })
    }

    /// Render a reply the way firmware of this dialect reports a switch
    ///
    /// Used by simulators; the inverse of [`Cc1Dialect::parse_switch`].
    pub fn switch_reply(self, on: bool) -> &'static str {
        self.switch_token(on)
    }

    /// Render a reply the way firmware of this dialect reports a trigger mode
    pub fn trigger_reply(self, mode: TriggerMode) -> &'static str {
        match (self, mode) {
            (Cc1Dialect::Modern, TriggerMode::Continuous) => "MODE CONT",
            (Cc1Dialect::Modern, TriggerMode::StartStop) => "MODE STOP",
            (Cc1Dialect::Legacy, mode) => self.trigger_token(mode),
        }
    }
}

/// Check a 0-based channel index against the CC1 channel count
pub fn check_channel(index: usize) -> Result<usize, ValidationError> {
    if index < CHANNEL_COUNT {
        Ok(index)
    } else {
        Err(ValidationError::ChannelOutOfRange {
            index,
            count: CHANNEL_COUNT,
        })
    }
}

/// Returns true if a firmware reply is the CC1's "Unknown command" answer
///
/// The counter sometimes answers the very first query after power-up this way.
pub fn is_unknown_command_reply(reply: &str) -> bool {
    reply.contains("Unknown")
}
