//! Sans-IO SASL state machine.
//!
//! The machine never touches a socket. It is fed parsed [`ServerReply`]
//! values and answers with the next [`ClientCommand`] to send, so each
//! transition can be exercised on its own.

use crate::sasl::mechanism::AuthMechanism;

use std::fmt::{Display, Formatter, Result as FormatResult};

use log::{debug, warn};

const LINE_ENDING: &str = "\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaslState {
    Start,
    /// An `AUTH`, `DATA` or `CANCEL` is outstanding.
    WaitingForSaslLineExchange,
    /// `OK` received, `NEGOTIATE_UNIX_FD` outstanding.
    NegotiatingFdPassing,
    /// `BEGIN` is the last command; binary traffic may follow.
    Authenticated,
    Failed,
}

/// A line received from the server, already stripped of `\r\n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerReply {
    Ok(String),
    Rejected(Vec<String>),
    Data(Vec<u8>),
    Error(String),
    AgreeUnixFd,
    Unknown(String),
}

impl ServerReply {
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let (command, rest) = match line.split_once(' ') {
            Some((command, rest)) => (command, rest.trim()),
            None => (line, ""),
        };

        match command {
            "OK" => ServerReply::Ok(rest.to_string()),
            "REJECTED" => {
                ServerReply::Rejected(rest.split_whitespace().map(str::to_string).collect())
            }
            "DATA" => match hex::decode(rest) {
                Ok(bytes) => ServerReply::Data(bytes),
                Err(_) => ServerReply::Unknown(line.to_string()),
            },
            "ERROR" => ServerReply::Error(rest.to_string()),
            "AGREE_UNIX_FD" => ServerReply::AgreeUnixFd,
            _ => ServerReply::Unknown(line.to_string()),
        }
    }
}

/// A command line the client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Auth {
        mechanism: String,
        initial_response: Option<Vec<u8>>,
    },
    Data(Vec<u8>),
    Cancel,
    Begin,
    NegotiateUnixFd,
}

impl ClientCommand {
    /// Wire form, including the trailing `\r\n`.
    pub fn to_line(&self) -> String {
        format!("{self}{LINE_ENDING}")
    }
}

impl Display for ClientCommand {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self {
            ClientCommand::Auth {
                mechanism,
                initial_response: Some(response),
            } => write!(formatter, "AUTH {mechanism} {}", hex::encode(response)),
            ClientCommand::Auth {
                mechanism,
                initial_response: None,
            } => write!(formatter, "AUTH {mechanism}"),
            ClientCommand::Data(data) if data.is_empty() => write!(formatter, "DATA"),
            ClientCommand::Data(data) => write!(formatter, "DATA {}", hex::encode(data)),
            ClientCommand::Cancel => write!(formatter, "CANCEL"),
            ClientCommand::Begin => write!(formatter, "BEGIN"),
            ClientCommand::NegotiateUnixFd => write!(formatter, "NEGOTIATE_UNIX_FD"),
        }
    }
}

/// What the driver must do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Send(ClientCommand),
    Done,
}

/// Outcome of a handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeResult {
    pub authenticated: bool,
    pub fd_passing_agreed: bool,
    pub server_id: Vec<u8>,
}

pub struct SaslMachine {
    mechanisms: Vec<Box<dyn AuthMechanism>>,
    current: Option<usize>,
    server_mechanisms: Vec<String>,
    negotiate_fd: bool,
    state: SaslState,
    fd_passing_agreed: bool,
    server_id: Vec<u8>,
    protocol_violation: Option<String>,
}

impl SaslMachine {
    /// Mechanisms are tried in the order given.
    pub fn new(mechanisms: Vec<Box<dyn AuthMechanism>>, negotiate_fd: bool) -> Self {
        Self {
            mechanisms,
            current: None,
            server_mechanisms: Vec::new(),
            negotiate_fd,
            state: SaslState::Start,
            fd_passing_agreed: false,
            server_id: Vec::new(),
            protocol_violation: None,
        }
    }

    pub fn state(&self) -> SaslState {
        self.state
    }

    /// True once nothing more will be sent or received.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, SaslState::Authenticated | SaslState::Failed)
    }

    /// Name of the mechanism currently being attempted.
    pub fn current_mechanism(&self) -> Option<&str> {
        self.current.map(|index| self.mechanisms[index].name())
    }

    /// Why the exchange broke off, if the peer (or caller) broke protocol.
    /// `None` after a plain rejection of every mechanism.
    pub fn protocol_violation(&self) -> Option<&str> {
        self.protocol_violation.as_deref()
    }

    pub fn result(&self) -> HandshakeResult {
        HandshakeResult {
            authenticated: self.state == SaslState::Authenticated,
            fd_passing_agreed: self.state == SaslState::Authenticated && self.fd_passing_agreed,
            server_id: self.server_id.clone(),
        }
    }

    /// Produce the first `AUTH` command.
    pub fn start(&mut self) -> Step {
        if self.state != SaslState::Start {
            return self.fail("start() called twice");
        }
        self.next_mechanism()
    }

    /// Feed one server reply and get the next step.
    pub fn on_reply(&mut self, reply: ServerReply) -> Step {
        match (self.state, reply) {
            (SaslState::WaitingForSaslLineExchange, ServerReply::Ok(guid)) => {
                debug!(
                    "Mechanism {} accepted by server {guid}",
                    self.current_mechanism().unwrap_or("<none>")
                );
                self.server_id = guid.into_bytes();
                if self.negotiate_fd {
                    self.state = SaslState::NegotiatingFdPassing;
                    Step::Send(ClientCommand::NegotiateUnixFd)
                } else {
                    self.state = SaslState::Authenticated;
                    Step::Send(ClientCommand::Begin)
                }
            }
            (SaslState::WaitingForSaslLineExchange, ServerReply::Rejected(supported)) => {
                warn!(
                    "Mechanism {} rejected, server supports {supported:?}",
                    self.current_mechanism().unwrap_or("<none>")
                );
                if !supported.is_empty() {
                    self.server_mechanisms = supported;
                }
                self.next_mechanism()
            }
            (SaslState::WaitingForSaslLineExchange, ServerReply::Data(challenge)) => {
                let Some(index) = self.current else {
                    return self.fail("DATA received with no mechanism in progress");
                };
                match self.mechanisms[index].challenge(&challenge) {
                    Ok(response) => Step::Send(ClientCommand::Data(response)),
                    Err(e) => {
                        warn!("Cancelling {}: {e}", self.mechanisms[index].name());
                        Step::Send(ClientCommand::Cancel)
                    }
                }
            }
            (SaslState::WaitingForSaslLineExchange, ServerReply::Error(message)) => {
                debug!("Server error during authentication: {message}");
                Step::Send(ClientCommand::Cancel)
            }
            (SaslState::NegotiatingFdPassing, ServerReply::AgreeUnixFd) => {
                self.fd_passing_agreed = true;
                self.state = SaslState::Authenticated;
                Step::Send(ClientCommand::Begin)
            }
            (SaslState::NegotiatingFdPassing, ServerReply::Error(message)) => {
                debug!("Server declined fd passing: {message}");
                self.fd_passing_agreed = false;
                self.state = SaslState::Authenticated;
                Step::Send(ClientCommand::Begin)
            }
            (state, reply) => self.fail(&format!("Unexpected reply {reply:?} in state {state:?}")),
        }
    }

    /// Move to the next local mechanism the server may accept.
    fn next_mechanism(&mut self) -> Step {
        let first = self.current.map_or(0, |index| index + 1);

        for index in first..self.mechanisms.len() {
            self.current = Some(index);
            let mechanism = &mut self.mechanisms[index];

            if !self.server_mechanisms.is_empty()
                && !self.server_mechanisms.iter().any(|name| name == mechanism.name())
            {
                continue;
            }

            match mechanism.initial_response() {
                Ok(initial_response) => {
                    self.state = SaslState::WaitingForSaslLineExchange;
                    return Step::Send(ClientCommand::Auth {
                        mechanism: mechanism.name().to_string(),
                        initial_response,
                    });
                }
                Err(e) => debug!("Skipping mechanism {}: {e}", mechanism.name()),
            }
        }

        self.current = None;
        debug!("SASL handshake failed: no remaining mechanisms");
        self.state = SaslState::Failed;
        Step::Done
    }

    fn fail(&mut self, reason: &str) -> Step {
        debug!("SASL handshake failed: {reason}");
        self.protocol_violation = Some(reason.to_string());
        self.state = SaslState::Failed;
        Step::Done
    }
}
