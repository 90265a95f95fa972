//! Qubitekk CC1 coincidence counter driver
//!
//! The driver asks for the firmware version once, at construction, and
//! picks the command dialect from it for the rest of the session.
//!
//! Set commands are acknowledged by the counter with an empty line, which is
//! read and discarded. `CLEA` is not acknowledged.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use ik_comm::Communicator;
use ik_protocol::qubitekk::{
    check_channel, is_unknown_command_reply, Cc1Command, Cc1Dialect, Switch, TriggerMode,
    CHANNEL_COUNT,
};
use ik_protocol::{
    parse_integer, Cc1Limits, FirmwareVersion, ParseError, Quantity, Unit, ValidationError, Value,
};
use tracing::{debug, info, trace};

use crate::error::DriverError;

/// How many times `FIRM?` is sent while the counter answers "Unknown command"
pub const FIRMWARE_ATTEMPTS: usize = 5;

/// Qubitekk CC1 coincidence counter
pub struct Cc1<C: Communicator> {
    comm: C,
    firmware: FirmwareVersion,
    dialect: Cc1Dialect,
    limits: Cc1Limits,
}

impl<C: Communicator> Cc1<C> {
    /// Connect with the default limits
    pub fn new(comm: C) -> Result<Self, DriverError> {
        Self::with_limits(comm, Cc1Limits::default())
    }

    /// Connect with custom limits for window, delay and dwell time
    pub fn with_limits(mut comm: C, limits: Cc1Limits) -> Result<Self, DriverError> {
        comm.set_terminator("\n");
        let firmware = read_firmware(&mut comm)?;
        let dialect = Cc1Dialect::for_firmware(firmware);
        info!(
            "CC1 at {} runs firmware {} ({:?} dialect)",
            comm.address(),
            firmware,
            dialect
        );
        Ok(Self {
            comm,
            firmware,
            dialect,
            limits,
        })
    }

    /// Firmware version read at construction
    pub fn firmware(&self) -> FirmwareVersion {
        self.firmware
    }

    /// Dialect selected for this session
    pub fn dialect(&self) -> Cc1Dialect {
        self.dialect
    }

    pub fn limits(&self) -> &Cc1Limits {
        &self.limits
    }

    /// Borrow the underlying communicator
    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Give back the communicator
    pub fn into_inner(self) -> C {
        self.comm
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    fn query(&mut self, cmd: &Cc1Command) -> Result<String, DriverError> {
        let line = self.dialect.encode(cmd);
        let reply = self.comm.query(&line, None)?;
        trace!("CC1 {} -> {:?}", line, reply);
        Ok(reply)
    }

    fn command(&mut self, cmd: &Cc1Command) -> Result<(), DriverError> {
        let line = self.dialect.encode(cmd);
        self.comm.sendcmd(&line)?;
        if cmd.is_set() {
            let _ack = self.comm.read(None)?;
        }
        debug!("CC1 {}", line);
        Ok(())
    }

    fn query_integer(&mut self, field: &'static str, cmd: &Cc1Command) -> Result<i64, DriverError> {
        let reply = self.query(cmd)?;
        Ok(parse_integer(field, &reply)?)
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Coincidence window
    pub fn window(&mut self) -> Result<Quantity, DriverError> {
        let ns = self.query_integer("window", &Cc1Command::Window(None))?;
        Ok(Quantity::ns(ns as f64))
    }

    /// Set the coincidence window
    pub fn set_window(&mut self, window: Quantity) -> Result<(), DriverError> {
        let ns = self.limits.validate_window(window)?;
        self.command(&Cc1Command::Window(Some(ns)))
    }

    /// Channel delay
    pub fn delay(&mut self) -> Result<Quantity, DriverError> {
        let ns = self.query_integer("delay", &Cc1Command::Delay(None))?;
        Ok(Quantity::ns(ns as f64))
    }

    /// Set the channel delay; must be a multiple of the delay step
    pub fn set_delay(&mut self, delay: Quantity) -> Result<(), DriverError> {
        let ns = self.limits.validate_delay(delay)?;
        self.command(&Cc1Command::Delay(Some(ns)))
    }

    /// Dwell time
    pub fn dwell_time(&mut self) -> Result<Quantity, DriverError> {
        let s = self.query_integer("dwell time", &Cc1Command::DwellTime(None))?;
        Ok(Quantity::s(s as f64))
    }

    /// Set the dwell time in whole seconds
    pub fn set_dwell_time(&mut self, dwell: Quantity) -> Result<(), DriverError> {
        let s = self.limits.validate_dwell_time(dwell)?;
        self.command(&Cc1Command::DwellTime(Some(s)))
    }

    /// Gate mode
    pub fn gate(&mut self) -> Result<bool, DriverError> {
        let reply = self.query(&Cc1Command::Gate(None))?;
        Ok(self.dialect.parse_switch(Switch::Gate, &reply)?)
    }

    pub fn set_gate(&mut self, on: bool) -> Result<(), DriverError> {
        self.command(&Cc1Command::Gate(Some(on)))
    }

    /// Accidental subtraction
    pub fn subtract(&mut self) -> Result<bool, DriverError> {
        let reply = self.query(&Cc1Command::Subtract(None))?;
        Ok(self.dialect.parse_switch(Switch::Subtract, &reply)?)
    }

    pub fn set_subtract(&mut self, on: bool) -> Result<(), DriverError> {
        self.command(&Cc1Command::Subtract(Some(on)))
    }

    /// Trigger mode
    pub fn trigger(&mut self) -> Result<TriggerMode, DriverError> {
        let reply = self.query(&Cc1Command::Trigger(None))?;
        Ok(self.dialect.parse_trigger(&reply)?)
    }

    pub fn set_trigger(&mut self, mode: TriggerMode) -> Result<(), DriverError> {
        self.command(&Cc1Command::Trigger(Some(mode)))
    }

    /// Reset the counts on all channels
    pub fn clear_counts(&mut self) -> Result<(), DriverError> {
        self.command(&Cc1Command::Clear)
    }

    // ------------------------------------------------------------------
    // Channels
    // ------------------------------------------------------------------

    /// Handle for a 0-based input channel
    pub fn channel(&mut self, index: usize) -> Result<Channel<'_, C>, DriverError> {
        let index = check_channel(index)?;
        Ok(Channel { cc1: self, index })
    }

    /// Valid channel indices
    pub fn channels(&self) -> Range<usize> {
        0..CHANNEL_COUNT
    }

    fn count(&mut self, index: usize) -> Result<Quantity, DriverError> {
        let n = self.query_integer("count", &Cc1Command::Count { channel: index })?;
        Ok(Quantity::dimensionless(n as f64))
    }

    // ------------------------------------------------------------------
    // Name-based access
    // ------------------------------------------------------------------

    /// Read a property by name
    pub fn get(&mut self, prop: Cc1Property) -> Result<Value, DriverError> {
        let value = match prop {
            Cc1Property::Window => Value::Quantity(self.window()?),
            Cc1Property::Delay => Value::Quantity(self.delay()?),
            Cc1Property::DwellTime => Value::Quantity(self.dwell_time()?),
            Cc1Property::Gate => Value::Bool(self.gate()?),
            Cc1Property::Subtract => Value::Bool(self.subtract()?),
            Cc1Property::Trigger => Value::Text(self.trigger()?.name().to_string()),
            Cc1Property::Firmware => Value::Version(self.firmware),
            Cc1Property::Count(index) => Value::Quantity(self.channel(index)?.count()?),
        };
        Ok(value)
    }

    /// Write a property by name
    ///
    /// The value's type is checked before anything is sent: a non-boolean
    /// for a switch is a type error, an unknown trigger mode is a value error.
    pub fn set(&mut self, prop: Cc1Property, value: &Value) -> Result<(), DriverError> {
        match prop {
            Cc1Property::Window => {
                self.set_window(value.as_quantity("window", Unit::Nanoseconds)?)
            }
            Cc1Property::Delay => self.set_delay(value.as_quantity("delay", Unit::Nanoseconds)?),
            Cc1Property::DwellTime => {
                self.set_dwell_time(value.as_quantity("dwell time", Unit::Seconds)?)
            }
            Cc1Property::Gate => self.set_gate(value.as_bool("gate")?),
            Cc1Property::Subtract => self.set_subtract(value.as_bool("subtract")?),
            Cc1Property::Trigger => self.set_trigger(value.as_choice().parse()?),
            Cc1Property::Firmware => Err(ValidationError::ReadOnly("firmware").into()),
            Cc1Property::Count(_) => Err(ValidationError::ReadOnly("count").into()),
        }
    }
}

fn read_firmware<C: Communicator>(comm: &mut C) -> Result<FirmwareVersion, DriverError> {
    let command = Cc1Dialect::Modern.encode(&Cc1Command::Firmware);
    let mut reply = String::new();
    for attempt in 1..=FIRMWARE_ATTEMPTS {
        reply = comm.query(&command, None)?;
        if !is_unknown_command_reply(&reply) {
            return Ok(FirmwareVersion::parse(&reply)?);
        }
        debug!("CC1 answered {:?} to FIRM? (attempt {})", reply, attempt);
    }
    Err(ParseError::InvalidVersion(reply).into())
}

/// One input channel of a [`Cc1`]
pub struct Channel<'a, C: Communicator> {
    cc1: &'a mut Cc1<C>,
    index: usize,
}

impl<C: Communicator> Channel<'_, C> {
    /// 0-based channel index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Counts accumulated on this channel
    pub fn count(&mut self) -> Result<Quantity, DriverError> {
        self.cc1.count(self.index)
    }
}

/// CC1 property addressable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cc1Property {
    Window,
    Delay,
    DwellTime,
    Gate,
    Subtract,
    Trigger,
    Firmware,
    /// Counts on a 0-based channel
    Count(usize),
}

impl Cc1Property {
    /// Every property, with one count entry per channel
    pub fn all() -> Vec<Cc1Property> {
        let mut props = vec![
            Self::Firmware,
            Self::Window,
            Self::Delay,
            Self::DwellTime,
            Self::Gate,
            Self::Subtract,
            Self::Trigger,
        ];
        props.extend((0..CHANNEL_COUNT).map(Self::Count));
        props
    }
}

impl fmt::Display for Cc1Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window => f.write_str("window"),
            Self::Delay => f.write_str("delay"),
            Self::DwellTime => f.write_str("dwell_time"),
            Self::Gate => f.write_str("gate"),
            Self::Subtract => f.write_str("subtract"),
            Self::Trigger => f.write_str("trigger"),
            Self::Firmware => f.write_str("firmware"),
            Self::Count(i) => write!(f, "count:{i}"),
        }
    }
}

impl FromStr for Cc1Property {
    type Err = ValidationError;

    /// Names as printed by `Display`; `count:<n>` takes a 0-based channel
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let prop = match name.as_str() {
            "window" => Self::Window,
            "delay" => Self::Delay,
            "dwell_time" | "dwell" => Self::DwellTime,
            "gate" => Self::Gate,
            "subtract" => Self::Subtract,
            "trigger" => Self::Trigger,
            "firmware" => Self::Firmware,
            other => {
                let index = other
                    .strip_prefix("count:")
                    .and_then(|i| i.parse::<usize>().ok())
                    .ok_or_else(|| ValidationError::UnknownProperty(s.to_string()))?;
                Self::Count(check_channel(index)?)
            }
        };
        Ok(prop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_names() {
        for prop in Cc1Property::all() {
            assert_eq!(prop.to_string().parse::<Cc1Property>().unwrap(), prop);
        }
        assert_eq!("dwell".parse::<Cc1Property>().unwrap(), Cc1Property::DwellTime);
        assert!(matches!(
            "count:3".parse::<Cc1Property>(),
            Err(ValidationError::ChannelOutOfRange { index: 3, count: 3 })
        ));
        assert!(matches!(
            "colour".parse::<Cc1Property>(),
            Err(ValidationError::UnknownProperty(_))
        ));
    }
}
