//! Scripted communicator
//!
//! Replays a fixed conversation: every message the driver sends is recorded,
//! every read is served from a list of canned replies. [`ScriptedCommunicator::finish`]
//! then checks the recorded messages against the expected ones.

use std::collections::VecDeque;
use std::time::Duration;

use ik_comm::{Address, CommError, Communicator};
use thiserror::Error;
use tracing::trace;

/// Difference between the scripted and the actual conversation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptMismatch {
    /// A command differs from the script
    #[error("command {index}: expected {expected:?}, sent {actual:?}")]
    UnexpectedCommand {
        index: usize,
        expected: String,
        actual: String,
    },

    /// Fewer commands were sent than scripted
    #[error("expected commands were never sent: {0:?}")]
    MissingCommands(Vec<String>),

    /// More commands were sent than scripted
    #[error("unexpected extra commands: {0:?}")]
    ExtraCommands(Vec<String>),

    /// Some replies were never read
    #[error("replies were never read: {0:?}")]
    UnreadReplies(Vec<String>),
}

/// Communicator that plays back a fixed conversation
///
/// Commands are compared without their terminator. Each reply is served
/// whole by `read(None)`; `read(Some(n))` takes up to `n` bytes of the next
/// reply and leaves the rest for the following read.
pub struct ScriptedCommunicator {
    expected: Vec<String>,
    replies: VecDeque<String>,
    sent: Vec<String>,
    pending: String,
    terminator: String,
    timeout: Duration,
    closed: bool,
}

impl ScriptedCommunicator {
    /// Create a script from the expected commands and the replies to serve
    pub fn new<C, R>(commands: C, replies: R) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            expected: commands.into_iter().map(Into::into).collect(),
            replies: replies.into_iter().map(Into::into).collect(),
            sent: Vec::new(),
            pending: String::new(),
            terminator: "\n".to_string(),
            timeout: Duration::from_secs(1),
            closed: false,
        }
    }

    /// Messages sent so far, terminators removed
    pub fn sent(&self) -> &[String] {
        &self.sent
    }

    /// Number of replies not read yet
    pub fn remaining_replies(&self) -> usize {
        self.replies.len()
    }

    /// Compare the conversation that happened with the script
    pub fn finish(&self) -> Result<(), ScriptMismatch> {
        let mut sent = self.sent.clone();
        if !self.pending.is_empty() {
            sent.push(self.pending.clone());
        }

        for (index, (expected, actual)) in self.expected.iter().zip(&sent).enumerate() {
            if expected != actual {
                return Err(ScriptMismatch::UnexpectedCommand {
                    index,
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }
        if self.expected.len() > sent.len() {
            return Err(ScriptMismatch::MissingCommands(
                self.expected[sent.len()..].to_vec(),
            ));
        }
        if sent.len() > self.expected.len() {
            return Err(ScriptMismatch::ExtraCommands(
                sent[self.expected.len()..].to_vec(),
            ));
        }
        if !self.replies.is_empty() {
            return Err(ScriptMismatch::UnreadReplies(
                self.replies.iter().cloned().collect(),
            ));
        }
        Ok(())
    }

    fn check_open(&self) -> Result<(), CommError> {
        if self.closed {
            Err(CommError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Communicator for ScriptedCommunicator {
    fn address(&self) -> Address {
        Address::Loopback("scripted".to_string())
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
        self.check_open()?;
        let mut reply = self
            .replies
            .pop_front()
            .ok_or(CommError::Timeout(self.timeout))?;
        if let Some(n) = size {
            if reply.len() > n {
                let split = (0..=n).rev().find(|&i| reply.is_char_boundary(i)).unwrap_or(0);
                let rest = reply.split_off(split);
                self.replies.push_front(rest);
            }
        }
        trace!("<< {:?}", reply);
        Ok(reply)
    }

    fn write(&mut self, msg: &str) -> Result<(), CommError> {
        self.check_open()?;
        trace!(">> {:?}", msg);
        self.pending.push_str(msg);
        if self.terminator.is_empty() {
            self.sent.push(std::mem::take(&mut self.pending));
            return Ok(());
        }
        while let Some(pos) = self.pending.find(self.terminator.as_str()) {
            let line = self.pending[..pos].to_string();
            self.pending.drain(..pos + self.terminator.len());
            self.sent.push(line);
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
