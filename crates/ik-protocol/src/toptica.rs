//! Toptica TopMode Control Language
//!
//! The TopMode laser is driven with a small Scheme-like language over a
//! serial line:
//!
//! - `(param-ref 'laser1:wavelength)` - read a parameter
//! - `(param-set! 'laser1:enable-emission #t)` - write a parameter
//! - `(param-disp 'laser1:wavelength)` - read a parameter's display form
//! - `(exec 'reboot-system)` - run a procedure
//!
//! # Transaction framing
//!
//! The laser echoes every command line, then prints the result line, then
//! its prompt `> `. `exec` prints a result line only for procedures that
//! announce themselves (see [`exec_ack`]). Booleans are `#t`/`#f`; timestamps are
//! `YYYY-MM-DD HH:MM:SS`, or `""` when unset.

use std::fmt;

use chrono::NaiveDateTime;

use crate::error::ParseError;
use crate::EncodeCommand;

/// Prompt printed after every transaction
pub const PROMPT: &str = "> ";

/// Number of laser heads on a TopMode
pub const LASER_COUNT: usize = 2;

/// Extra line printed when the system starts rebooting
pub const REBOOT_NOTICE: &str = "reboot process started.";

/// Extra line printed when a charm correction starts
pub const CORRECTION_NOTICE: &str = "()";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Value written with `param-set!`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Quoted string: `"abc"`
    Text(String),
    /// Quoted list: `'(a b c)`
    List(Vec<String>),
    /// Boolean: `#t` / `#f`
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Text(s) => write!(f, "\"{s}\""),
            ParamValue::List(items) => write!(f, "'({})", items.join(" ")),
            ParamValue::Bool(true) => f.write_str("#t"),
            ParamValue::Bool(false) => f.write_str("#f"),
        }
    }
}

/// TopMode control language command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopModeCommand {
    /// Read a parameter
    ParamRef(String),
    /// Write a parameter
    ParamSet(String, ParamValue),
    /// Read a parameter's display form
    ParamDisp(String),
    /// Run a procedure
    Exec(String),
}

impl EncodeCommand for TopModeCommand {
    fn encode(&self) -> String {
        match self {
            TopModeCommand::ParamRef(param) => format!("(param-ref '{param})"),
            TopModeCommand::ParamSet(param, value) => format!("(param-set! '{param} {value})"),
            TopModeCommand::ParamDisp(param) => format!("(param-disp '{param})"),
            TopModeCommand::Exec(cmd) => format!("(exec '{cmd})"),
        }
    }
}

/// Correction ("charm") status of a laser head
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharmStatus {
    /// Correction has never run
    UnInitialized = 0,
    /// Correction is running
    InProgress = 1,
    /// Last correction succeeded
    Success = 2,
    /// Last correction failed
    Failure = 3,
}

impl CharmStatus {
    /// Parse the numeric status reply
    pub fn parse(reply: &str) -> Result<Self, ParseError> {
        match crate::parse_integer("correction status", reply)? {
            0 => Ok(CharmStatus::UnInitialized),
            1 => Ok(CharmStatus::InProgress),
            2 => Ok(CharmStatus::Success),
            3 => Ok(CharmStatus::Failure),
            _ => Err(ParseError::UnrecognizedReply {
                field: "correction status",
                reply: reply.trim().to_string(),
            }),
        }
    }
}

/// Line the laser prints between echo and prompt for an `exec` command
///
/// Most procedures print nothing; rebooting and starting a correction
/// announce themselves.
pub fn exec_ack(command: &str) -> Option<&'static str> {
    if command.contains("reboot") {
        Some(REBOOT_NOTICE)
    } else if command.contains("start-correction") {
        Some(CORRECTION_NOTICE)
    } else {
        None
    }
}

/// Parse a `#t`/`#f` reply
pub fn parse_bool(field: &'static str, reply: &str) -> Result<bool, ParseError> {
    match reply.trim() {
        "#t" => Ok(true),
        "#f" => Ok(false),
        other => Err(ParseError::UnrecognizedReply {
            field,
            reply: other.to_string(),
        }),
    }
}

/// Parse a timestamp reply; an empty string literal means "never"
pub fn parse_datetime(reply: &str) -> Result<Option<NaiveDateTime>, ParseError> {
    let trimmed = reply.trim();
    if trimmed == "\"\"" || trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(unquote(trimmed), DATETIME_FORMAT)
        .map(Some)
        .map_err(|_| ParseError::InvalidDate(trimmed.to_string()))
}

/// Strip one level of surrounding double quotes from a string reply
pub fn unquote(reply: &str) -> &str {
    let trimmed = reply.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
}

/// Returns whether bit `bit` of a health register is set
pub fn health_bit(register: i64, bit: u32) -> bool {
    (register >> bit) & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_encode_commands() {
        assert_eq!(
            TopModeCommand::ParamRef("laser1:wavelength".into()).encode(),
            "(param-ref 'laser1:wavelength)"
        );
        assert_eq!(
            TopModeCommand::ParamSet("enable-emission".into(), ParamValue::Bool(true)).encode(),
            "(param-set! 'enable-emission #t)"
        );
        assert_eq!(
            TopModeCommand::ParamSet("name".into(), ParamValue::Text("abc".into())).encode(),
            "(param-set! 'name \"abc\")"
        );
        assert_eq!(
            TopModeCommand::ParamSet(
                "list".into(),
                ParamValue::List(vec!["a".into(), "b".into()])
            )
            .encode(),
            "(param-set! 'list '(a b))"
        );
        assert_eq!(
            TopModeCommand::ParamDisp("emission".into()).encode(),
            "(param-disp 'emission)"
        );
        assert_eq!(
            TopModeCommand::Exec("reboot-system".into()).encode(),
            "(exec 'reboot-system)"
        );
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("emission", "#t").unwrap());
        assert!(!parse_bool("emission", "#f\r").unwrap());
        assert!(parse_bool("emission", "Error: -3").is_err());
    }

    #[test]
    fn test_parse_datetime() {
        let expected = NaiveDate::from_ymd_opt(2012, 12, 1)
            .unwrap()
            .and_hms_opt(1, 2, 1)
            .unwrap();
        assert_eq!(
            parse_datetime("2012-12-01 01:02:01").unwrap(),
            Some(expected)
        );
        assert_eq!(
            parse_datetime("\"2012-12-01 01:02:01\"").unwrap(),
            Some(expected)
        );
        assert_eq!(parse_datetime("\"\"").unwrap(), None);
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_charm_status() {
        assert_eq!(CharmStatus::parse("0").unwrap(), CharmStatus::UnInitialized);
        assert_eq!(CharmStatus::parse("3").unwrap(), CharmStatus::Failure);
        assert!(CharmStatus::parse("4").is_err());
        assert!(CharmStatus::parse("x").is_err());
    }

    #[test]
    fn test_health_bits() {
        assert!(health_bit(0b1000_0000, 7));
        assert!(!health_bit(0b0100_0000, 7));
        assert!(health_bit(0b0010_0000, 5));
    }

    #[test]
    fn test_exec_ack() {
        assert_eq!(exec_ack("reboot-system"), Some(REBOOT_NOTICE));
        assert_eq!(exec_ack("laser1:charm:start-correction-initial"), Some("()"));
        assert_eq!(exec_ack("laser2:charm:start-correction"), Some("()"));
        assert_eq!(exec_ack("laser1:clear-errors"), None);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"018\""), "018");
        assert_eq!(unquote("018"), "018");
    }
}
