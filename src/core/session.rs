use crate::prelude::SdResult;

use super::{
    channel::{Channel, Transport},
    command::{default_actions, ActionList, Commands, LOCAL_PREFIX},
    number::{parse_address, Address},
    symbols::SymbolTable,
};

pub const SESSION_PROMPT: &str = "> ";
pub const LOOKUP_PROMPT: &str = "Enter an address: ";

/// Tells the output callback what kind of text it is printing
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CallbackKind {
    Plain,
    Resolved,
    Missing,
    Error,
}

/// Operator console. `None` means the operator is done.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> SdResult<Option<String>>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum State {
    AwaitingOperatorInput,
    SendingCommand(String),
    ReceivingReplyBurst,
    Closed,
}

/// Prints the symbol enclosing `address`
pub fn report_resolved<F>(table: &SymbolTable, address: Address, f: &mut F) -> SdResult<()>
where
    F: FnMut(&str, CallbackKind) -> SdResult<()>,
{
    match table.resolve(address) {
        Some(sym) => f(
            &format!("{:08X}\t{}\n", sym.address, sym.name),
            CallbackKind::Resolved,
        ),
        None => f(
            &format!("No symbol found for 0x{:X}\n", address),
            CallbackKind::Missing,
        ),
    }
}

/// Offline resolver: reads one address per line until an empty line
pub fn lookup_loop<F>(table: &SymbolTable, input: &mut impl LineSource, mut f: F) -> SdResult<()>
where
    F: FnMut(&str, CallbackKind) -> SdResult<()>,
{
    while let Some(line) = input.read_line(LOOKUP_PROMPT)? {
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        match parse_address(line) {
            Ok(address) => report_resolved(table, address, &mut f)?,
            Err(err) => f(&format!("{}\n", err), CallbackKind::Error)?,
        }
    }
    Ok(())
}

/// Half-duplex debug session.
/// The operator and the kernel take turns, a new command is only sent
/// once the previous reply burst was drained up to its empty line.
pub struct Session<'a, T: Transport> {
    table: &'a SymbolTable,
    channel: Channel<T>,
    actions: ActionList,
    state: State,
}

impl<'a, T: Transport> Session<'a, T> {
    pub fn new(table: &'a SymbolTable, channel: Channel<T>) -> Self {
        Self {
            table,
            channel,
            actions: default_actions(),
            state: State::AwaitingOperatorInput,
        }
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn channel(&self) -> &Channel<T> {
        &self.channel
    }

    /// Runs until the operator quits. Only channel failures are returned,
    /// per-line problems are reported through `f` and the session goes on.
    pub fn run<F>(&mut self, input: &mut impl LineSource, mut f: F) -> SdResult<()>
    where
        F: FnMut(&str, CallbackKind) -> SdResult<()>,
    {
        while self.state != State::Closed {
            self.step(input, &mut f)?;
        }
        log::info!("Session closed");
        Ok(())
    }

    /// Performs a single transition. On error the session is closed.
    pub fn step<F>(&mut self, input: &mut impl LineSource, f: &mut F) -> SdResult<()>
    where
        F: FnMut(&str, CallbackKind) -> SdResult<()>,
    {
        let state = std::mem::replace(&mut self.state, State::Closed);
        self.state = match state {
            State::AwaitingOperatorInput => match input.read_line(SESSION_PROMPT)? {
                Some(line) => self.operator_line(line.trim(), f)?,
                None => State::Closed,
            },
            State::SendingCommand(command) => match self.channel.send(&command) {
                Ok(()) => State::ReceivingReplyBurst,
                Err(err) if !err.is_fatal() => {
                    f(&format!("{}\n", err), CallbackKind::Error)?;
                    State::AwaitingOperatorInput
                }
                Err(err) => return Err(err),
            },
            State::ReceivingReplyBurst => {
                let line = self.channel.receive_line()?;
                let line = line.trim();
                if line.is_empty() {
                    State::AwaitingOperatorInput
                } else {
                    self.reply_line(line, f)?;
                    State::ReceivingReplyBurst
                }
            }
            State::Closed => State::Closed,
        };
        Ok(())
    }

    fn operator_line<F>(&self, line: &str, f: &mut F) -> SdResult<State>
    where
        F: FnMut(&str, CallbackKind) -> SdResult<()>,
    {
        let Some(local) = line.strip_prefix(LOCAL_PREFIX) else {
            return Ok(State::SendingCommand(line.into()));
        };

        let res = self
            .actions
            .eval(local)
            .and_then(|cmd| cmd.execute(&mut *f, self.table, &self.actions).map(|_| cmd));
        match res {
            Ok(Commands::Exit) => Ok(State::Closed),
            Ok(_) => Ok(State::AwaitingOperatorInput),
            Err(err) => {
                f(&format!("{}\n", err), CallbackKind::Error)?;
                Ok(State::AwaitingOperatorInput)
            }
        }
    }

    fn reply_line<F>(&self, line: &str, f: &mut F) -> SdResult<()>
    where
        F: FnMut(&str, CallbackKind) -> SdResult<()>,
    {
        match parse_address(line) {
            Ok(address) => report_resolved(self.table, address, f),
            Err(err) => {
                log::warn!("Ignoring reply line: {}", err);
                f(&format!("{}\n", err), CallbackKind::Error)
            }
        }
    }
}
