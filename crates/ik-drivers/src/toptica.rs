//! Toptica TopMode laser driver
//!
//! Every transaction is framed the same way: the laser echoes the command,
//! prints a result line (for queries and `param-set!`), then its prompt.
//! The driver checks the echo and the prompt, so a desynchronized stream is
//! reported instead of silently shifting replies by one line.

use std::ops::Range;

use chrono::NaiveDateTime;
use ik_comm::Communicator;
use ik_protocol::toptica::{
    exec_ack, health_bit, parse_bool, parse_datetime, unquote, CharmStatus, ParamValue,
    TopModeCommand, LASER_COUNT, PROMPT,
};
use ik_protocol::{parse_float, parse_integer, EncodeCommand, ParseError, Quantity, ValidationError};
use tracing::{debug, info, trace};

use crate::error::DriverError;

/// Toptica TopMode laser system
pub struct TopMode<C: Communicator> {
    comm: C,
}

impl<C: Communicator> TopMode<C> {
    /// Wrap a communicator; sets the `\n` terminator
    pub fn new(mut comm: C) -> Self {
        comm.set_terminator("\n");
        info!("TopMode at {}", comm.address());
        Self { comm }
    }

    /// Give back the communicator
    pub fn into_inner(self) -> C {
        self.comm
    }

    // ------------------------------------------------------------------
    // Control language
    // ------------------------------------------------------------------

    fn read_line(&mut self) -> Result<String, DriverError> {
        let line = self.comm.read(None)?;
        Ok(line.trim_end_matches('\r').to_string())
    }

    fn transaction(
        &mut self,
        cmd: &TopModeCommand,
        expect_result: bool,
    ) -> Result<Option<String>, DriverError> {
        let line = cmd.encode();
        self.comm.sendcmd(&line)?;

        let echo = self.read_line()?;
        if echo != line {
            return Err(ParseError::UnexpectedEcho {
                expected: line,
                actual: echo,
            }
            .into());
        }

        let result = if expect_result {
            Some(self.read_line()?)
        } else {
            None
        };

        let prompt = self.comm.read(Some(PROMPT.len()))?;
        if prompt != PROMPT {
            return Err(ParseError::MissingPrompt {
                expected: PROMPT.to_string(),
                actual: prompt,
            }
            .into());
        }
        trace!("TopMode {} -> {:?}", line, result);
        Ok(result)
    }

    /// Read a parameter (`param-ref`)
    pub fn reference(&mut self, param: &str) -> Result<String, DriverError> {
        let result = self.transaction(&TopModeCommand::ParamRef(param.to_string()), true)?;
        Ok(result.unwrap_or_default())
    }

    /// Read a parameter's display form (`param-disp`)
    pub fn display(&mut self, param: &str) -> Result<String, DriverError> {
        let result = self.transaction(&TopModeCommand::ParamDisp(param.to_string()), true)?;
        Ok(result.unwrap_or_default())
    }

    /// Write a parameter (`param-set!`)
    pub fn set(&mut self, param: &str, value: ParamValue) -> Result<(), DriverError> {
        debug!("TopMode set {} = {}", param, value);
        self.transaction(&TopModeCommand::ParamSet(param.to_string(), value), true)?;
        Ok(())
    }

    /// Run a procedure (`exec`)
    pub fn execute(&mut self, command: &str) -> Result<(), DriverError> {
        let ack = exec_ack(command);
        let result = self.transaction(&TopModeCommand::Exec(command.to_string()), ack.is_some())?;
        if let (Some(expected), Some(actual)) = (ack, result) {
            if actual != expected {
                return Err(ParseError::UnrecognizedReply {
                    field: "exec acknowledgement",
                    reply: actual,
                }
                .into());
            }
        }
        Ok(())
    }

    fn reference_bool(&mut self, field: &'static str, param: &str) -> Result<bool, DriverError> {
        let reply = self.reference(param)?;
        Ok(parse_bool(field, &reply)?)
    }

    // ------------------------------------------------------------------
    // System
    // ------------------------------------------------------------------

    /// Whether the system is lasing
    pub fn enable(&mut self) -> Result<bool, DriverError> {
        self.reference_bool("emission", "emission")
    }

    pub fn set_enable(&mut self, on: bool) -> Result<(), DriverError> {
        self.set("enable-emission", ParamValue::Bool(on))
    }

    /// Key switch lock
    pub fn locked(&mut self) -> Result<bool, DriverError> {
        self.reference_bool("front key lock", "front-key-locked")
    }

    /// Returns true if the interlock is open
    pub fn interlock(&mut self) -> Result<bool, DriverError> {
        self.reference_bool("interlock", "interlock-open")
    }

    /// Returns false after an FPGA failure
    pub fn fpga_status(&mut self) -> Result<bool, DriverError> {
        let reply = self.reference("system-health")?;
        if reply.contains("#f") {
            return Ok(false);
        }
        let health = parse_integer("system health", &reply)?;
        Ok(!health_bit(health, 0))
    }

    /// Returns false after a temperature controller failure
    pub fn temperature_status(&mut self) -> Result<bool, DriverError> {
        let health = self.system_health()?;
        Ok(!health_bit(health, 1))
    }

    /// Returns false after a current controller failure
    pub fn current_status(&mut self) -> Result<bool, DriverError> {
        let health = self.system_health()?;
        Ok(!health_bit(health, 2))
    }

    fn system_health(&mut self) -> Result<i64, DriverError> {
        let reply = self.reference("system-health")?;
        Ok(parse_integer("system health", &reply)?)
    }

    /// Reboot the system; the connection may need reopening afterwards
    pub fn reboot(&mut self) -> Result<(), DriverError> {
        info!("Rebooting TopMode at {}", self.comm.address());
        self.execute("reboot-system")
    }

    // ------------------------------------------------------------------
    // Lasers
    // ------------------------------------------------------------------

    /// Handle for a 0-based laser head
    pub fn laser(&mut self, index: usize) -> Result<Laser<'_, C>, DriverError> {
        if index >= LASER_COUNT {
            return Err(ValidationError::ChannelOutOfRange {
                index,
                count: LASER_COUNT,
            }
            .into());
        }
        Ok(Laser {
            name: format!("laser{}", index + 1),
            parent: self,
        })
    }

    /// Valid laser indices
    pub fn lasers(&self) -> Range<usize> {
        0..LASER_COUNT
    }
}

/// One laser head of a [`TopMode`]
pub struct Laser<'a, C: Communicator> {
    parent: &'a mut TopMode<C>,
    name: String,
}

impl<C: Communicator> Laser<'_, C> {
    /// Parameter prefix, `laser1` or `laser2`
    pub fn name(&self) -> &str {
        &self.name
    }

    fn reference(&mut self, suffix: &str) -> Result<String, DriverError> {
        let param = format!("{}:{}", self.name, suffix);
        self.parent.reference(&param)
    }

    fn reference_bool(&mut self, field: &'static str, suffix: &str) -> Result<bool, DriverError> {
        let reply = self.reference(suffix)?;
        Ok(parse_bool(field, &reply)?)
    }

    fn health(&mut self) -> Result<i64, DriverError> {
        let reply = self.reference("health")?;
        Ok(parse_integer("laser health", &reply)?)
    }

    fn timestamp(&mut self, suffix: &str) -> Result<Option<NaiveDateTime>, DriverError> {
        let reply = self.reference(suffix)?;
        Ok(parse_datetime(&reply)?)
    }

    pub fn serial_number(&mut self) -> Result<String, DriverError> {
        Ok(unquote(&self.reference("serial-number")?).to_string())
    }

    pub fn model(&mut self) -> Result<String, DriverError> {
        Ok(unquote(&self.reference("model")?).to_string())
    }

    /// Emission wavelength
    pub fn wavelength(&mut self) -> Result<Quantity, DriverError> {
        let reply = self.reference("wavelength")?;
        Ok(Quantity::nm(parse_float("wavelength", &reply)?))
    }

    pub fn production_date(&mut self) -> Result<String, DriverError> {
        Ok(unquote(&self.reference("production-date")?).to_string())
    }

    /// Whether this laser is emitting
    pub fn enable(&mut self) -> Result<bool, DriverError> {
        self.reference_bool("emission", "emission")
    }

    pub fn set_enable(&mut self, on: bool) -> Result<(), DriverError> {
        let param = format!("{}:enable-emission", self.name);
        self.parent.set(&param, ParamValue::Bool(on))
    }

    /// Accumulated emission time
    pub fn on_time(&mut self) -> Result<Quantity, DriverError> {
        let reply = self.reference("ontime")?;
        Ok(Quantity::s(parse_float("on time", &reply)?))
    }

    /// Health bit 7
    pub fn charm_status(&mut self) -> Result<bool, DriverError> {
        Ok(health_bit(self.health()?, 7))
    }

    /// Health bit 5
    pub fn temperature_control_status(&mut self) -> Result<bool, DriverError> {
        Ok(health_bit(self.health()?, 5))
    }

    /// Health bit 6
    pub fn current_control_status(&mut self) -> Result<bool, DriverError> {
        Ok(health_bit(self.health()?, 6))
    }

    pub fn tec_status(&mut self) -> Result<bool, DriverError> {
        self.reference_bool("TEC ready", "tec:ready")
    }

    /// Unitless intensity
    pub fn intensity(&mut self) -> Result<f64, DriverError> {
        let reply = self.reference("intensity")?;
        Ok(parse_float("intensity", &reply)?)
    }

    /// Whether a mode hop has occurred
    pub fn mode_hop(&mut self) -> Result<bool, DriverError> {
        self.reference_bool("mode hop", "charm:reg:mh-occured")
    }

    pub fn lock_start(&mut self) -> Result<Option<NaiveDateTime>, DriverError> {
        self.timestamp("charm:reg:started")
    }

    pub fn first_mode_hop_time(&mut self) -> Result<Option<NaiveDateTime>, DriverError> {
        self.timestamp("charm:reg:first-mh")
    }

    pub fn latest_mode_hop_time(&mut self) -> Result<Option<NaiveDateTime>, DriverError> {
        self.timestamp("charm:reg:latest-mh")
    }

    pub fn correction_status(&mut self) -> Result<CharmStatus, DriverError> {
        let reply = self.reference("charm:correction-status")?;
        Ok(CharmStatus::parse(&reply)?)
    }

    /// Start a charm correction, the initial one if none has run yet
    pub fn correction(&mut self) -> Result<(), DriverError> {
        let procedure = if self.correction_status()? == CharmStatus::UnInitialized {
            "charm:start-correction-initial"
        } else {
            "charm:start-correction"
        };
        let command = format!("{}:{}", self.name, procedure);
        self.parent.execute(&command)
    }
}
