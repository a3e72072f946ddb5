use console::style;
use rustyline::{error::ReadlineError, DefaultEditor};

use crate::prelude::{CallbackKind, LineSource, SdResult};

pub fn default_interactive_callback(s: &str, kind: CallbackKind) -> SdResult<()> {
    match kind {
        CallbackKind::Plain => print!("{}", s),
        CallbackKind::Resolved => print!("{}", style(s).green()),
        CallbackKind::Missing => print!("{}", style(s).yellow()),
        CallbackKind::Error => eprint!("{}", style(s).red()),
    }
    Ok(())
}

/// Operator console backed by a rustyline editor with history
pub struct Editor {
    rl: DefaultEditor,
}

impl Editor {
    pub fn new() -> SdResult<Self> {
        Ok(Self {
            rl: DefaultEditor::new()?,
        })
    }
}

impl LineSource for Editor {
    fn read_line(&mut self, prompt: &str) -> SdResult<Option<String>> {
        match self.rl.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    self.rl.add_history_entry(line.as_str())?;
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
