use crate::prelude::{Error, SdResult};

use super::{
    number::{parse_address, Address},
    session::CallbackKind,
    symbols::SymbolTable,
};

/// Operator lines starting with this prefix are handled locally
/// instead of being sent to the kernel
pub const LOCAL_PREFIX: char = ':';

pub fn default_actions() -> ActionList {
    ActionList {
        actions: vec![
            Action::new(
                "?",
                vec![Param::with_default("command", "")],
                help_parser,
                "Display help",
            ),
            Action::new("q", vec![], exit_parser, "Close the session"),
            Action::new(
                "sym",
                vec![Param::new("address")],
                symbol_parser,
                "Resolve an address without asking the kernel",
            ),
            Action::new(
                "find",
                vec![Param::new("name")],
                find_parser,
                "Look up the address of a symbol",
            ),
        ],
    }
}

/// Command syntax:
/// An action name followed by a list of parameters,
/// tokenized like a shell would, so names with spaces can be quoted:
/// find "operator new(unsigned int)"
pub struct ActionList {
    actions: Vec<Action>,
}

impl ActionList {
    pub fn eval(&self, input: &str) -> SdResult<Commands> {
        let tokens = shell_words::split(input).map_err(anyhow::Error::from)?;
        let mut split = tokens.iter().map(String::as_str);
        let cmd = split.next().unwrap_or("");
        let args: Vec<&str> = split.collect();
        let action = self
            .actions
            .iter()
            .find(|x| x.name == cmd)
            .ok_or_else(|| Error::UnknownCommand(cmd.into()))?;

        action.eval(&args)
    }

    fn help<F>(&self, f: &mut F, cmd: &str) -> SdResult<()>
    where
        F: FnMut(&str, CallbackKind) -> SdResult<()>,
    {
        let mut printed = false;
        for action in &self.actions {
            if action.name.starts_with(cmd) {
                printed = true;
                action.help(f)?;
            }
        }
        if printed {
            if cmd.is_empty() {
                f(
                    "Any other input is sent to the kernel as a command\n",
                    CallbackKind::Plain,
                )?;
            }
            Ok(())
        } else {
            Err(Error::UnknownCommand(cmd.into()))
        }
    }
}

#[derive(Default)]
pub struct Param {
    name: String,
    default_value: Option<String>,
}

impl Param {
    fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            default_value: None,
        }
    }

    fn with_default(name: &str, default_value: &str) -> Self {
        Self {
            name: name.into(),
            default_value: Some(default_value.into()),
        }
    }
}

type CommandParser = fn(&[&str], &[Param]) -> SdResult<Commands>;

pub struct Action {
    help: String,
    name: String,
    params: Vec<Param>,
    parser: CommandParser,
}

impl Action {
    fn new(name: &str, params: Vec<Param>, parser: CommandParser, help: &str) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            params,
            parser,
        }
    }

    fn eval(&self, args: &[&str]) -> SdResult<Commands> {
        (self.parser)(args, &self.params)
    }

    fn help<F>(&self, f: &mut F) -> SdResult<()>
    where
        F: FnMut(&str, CallbackKind) -> SdResult<()>,
    {
        f(&format!("{}{}", LOCAL_PREFIX, self.name), CallbackKind::Plain)?;
        self.params.iter().try_for_each(|x| {
            if let Some(default_value) = &x.default_value {
                f(
                    &format!(" [{}='{}']", x.name, default_value),
                    CallbackKind::Plain,
                )
            } else {
                f(&format!(" [{}]", x.name), CallbackKind::Plain)
            }
        })?;
        f(&format!(" {}\n", self.help), CallbackKind::Plain)?;
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Commands {
    Exit,
    Help(String),
    Symbol(Address),
    Find(String),
}

impl Commands {
    pub fn execute<F>(&self, f: &mut F, table: &SymbolTable, actions: &ActionList) -> SdResult<()>
    where
        F: FnMut(&str, CallbackKind) -> SdResult<()>,
    {
        match self {
            Commands::Exit => Ok(()),
            Commands::Help(cmd) => actions.help(f, cmd),
            Commands::Symbol(address) => match table.resolve(*address) {
                Some(sym) => f(
                    &format!(
                        "{:08X}\t{}+0x{:X}\n",
                        sym.address,
                        sym.name,
                        sym.offset_of(*address)
                    ),
                    CallbackKind::Resolved,
                ),
                None => f(
                    &format!("No symbol found for 0x{:X}\n", address),
                    CallbackKind::Missing,
                ),
            },
            Commands::Find(name) => match table.find_by_name(name) {
                Some(sym) => f(
                    &format!("{:08X}\t{}\n", sym.address, sym.name),
                    CallbackKind::Resolved,
                ),
                None => f(
                    &format!("No symbol named '{}'\n", name),
                    CallbackKind::Missing,
                ),
            },
        }
    }
}

/* Command parsers */

fn get_arg_or(args: &[&str], params: &[Param], index: usize) -> SdResult<String> {
    match (args.get(index), params.get(index)) {
        (Some(arg), Some(_)) => Ok(arg.to_string()),
        (None, Some(Param {
            default_value: Some(def),
            ..
        })) => Ok(def.into()),
        _ => Err(Error::InsufficientArguments),
    }
}

fn has_too_many_args(args: &[&str], params: &[Param]) -> SdResult<()> {
    if args.len() > params.len() {
        Err(Error::TooManyArguments)
    } else {
        Ok(())
    }
}

fn help_parser(args: &[&str], params: &[Param]) -> SdResult<Commands> {
    has_too_many_args(args, params)?;

    let cmd = get_arg_or(args, params, 0)?;

    Ok(Commands::Help(cmd))
}

fn exit_parser(args: &[&str], params: &[Param]) -> SdResult<Commands> {
    has_too_many_args(args, params)?;
    Ok(Commands::Exit)
}

fn symbol_parser(args: &[&str], params: &[Param]) -> SdResult<Commands> {
    has_too_many_args(args, params)?;
    let address = get_arg_or(args, params, 0)?;
    Ok(Commands::Symbol(parse_address(&address)?))
}

fn find_parser(args: &[&str], params: &[Param]) -> SdResult<Commands> {
    has_too_many_args(args, params)?;
    Ok(Commands::Find(get_arg_or(args, params, 0)?))
}

#[cfg(test)]
mod test {
    use super::{default_actions, Commands};
    use crate::core::{session::CallbackKind, symbols::SymbolTable};
    use crate::prelude::{Error, SdResult};

    fn run(input: &str) -> Vec<(CallbackKind, String)> {
        let table = SymbolTable::parse("0x1000 foo\n0x2000 operator new(unsigned int)\n");
        let actions = default_actions();
        let mut out = vec![];
        let mut f = |s: &str, kind: CallbackKind| -> SdResult<()> {
            out.push((kind, s.to_string()));
            Ok(())
        };
        actions
            .eval(input)
            .unwrap()
            .execute(&mut f, &table, &actions)
            .unwrap();
        out
    }

    #[test]
    fn parse_commands() {
        let actions = default_actions();
        assert_eq!(Commands::Exit, actions.eval("q").unwrap());
        assert_eq!(Commands::Help("".into()), actions.eval("?").unwrap());
        assert_eq!(Commands::Help("sym".into()), actions.eval("? sym").unwrap());
        assert_eq!(Commands::Symbol(0x1234), actions.eval("sym 0x1234").unwrap());
        assert_eq!(
            Commands::Find("a b".into()),
            actions.eval("find \"a b\"").unwrap()
        );
    }

    #[test]
    fn parse_errors() {
        let actions = default_actions();
        assert!(matches!(actions.eval("nope"), Err(Error::UnknownCommand(_))));
        assert!(matches!(actions.eval("q now"), Err(Error::TooManyArguments)));
        assert!(matches!(
            actions.eval("sym"),
            Err(Error::InsufficientArguments)
        ));
        assert!(matches!(actions.eval("sym xyz"), Err(Error::InvalidAddress(_))));
        assert!(matches!(actions.eval("find \"open"), Err(Error::Other(_))));
    }

    #[test]
    fn resolve_locally() {
        assert_eq!(
            vec![(CallbackKind::Resolved, "00001000\tfoo+0x24\n".to_string())],
            run("sym 0x1024")
        );
        assert_eq!(
            vec![(CallbackKind::Missing, "No symbol found for 0x10\n".to_string())],
            run("sym 16")
        );
    }

    #[test]
    fn find_quoted_name() {
        assert_eq!(
            vec![(
                CallbackKind::Resolved,
                "00002000\toperator new(unsigned int)\n".to_string()
            )],
            run("find 'operator new(unsigned int)'")
        );
    }

    #[test]
    fn help_lists_matching() {
        let out: String = run("? s").into_iter().map(|(_, s)| s).collect();
        assert_eq!(":sym [address] Resolve an address without asking the kernel\n", out);

        let out: String = run("?").into_iter().map(|(_, s)| s).collect();
        assert!(out.contains(":q Close the session\n"));
        assert!(out.contains(":find [name]"));
    }
}
