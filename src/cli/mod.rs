pub mod interactive;

use crate::{
    core::{config::generate_completion, session::lookup_loop},
    prelude::{Channel, Commands, Config, Device, SdResult, Session, SymbolTable},
};

use self::interactive::{default_interactive_callback, Editor};

pub fn init(cfg: &Config) -> SdResult<()> {
    if let Some(shell) = cfg.completions {
        generate_completion(shell);
        return Ok(());
    }

    simple_logger::SimpleLogger::new()
        .with_level(cfg.log_level())
        .init()
        .map_err(|err| anyhow::anyhow!("{}", err))?;

    // without symbols none of the commands are of any use
    let table = SymbolTable::load(&cfg.map_path())?;

    match cfg.subcommand() {
        Commands::Session => session(cfg, &table),
        Commands::Which => which(cfg, &table),
        Commands::Dump => dump(cfg, &table),
    }
}

fn session(cfg: &Config, table: &SymbolTable) -> SdResult<()> {
    let mut channel = Channel::new(Device::open(&cfg.channel_path())?);
    channel.set_read_timeout(cfg.timeout())?;

    let mut editor = Editor::new()?;
    let mut session = Session::new(table, channel);
    session.run(&mut editor, default_interactive_callback)
}

fn which(_cfg: &Config, table: &SymbolTable) -> SdResult<()> {
    let mut editor = Editor::new()?;
    lookup_loop(table, &mut editor, default_interactive_callback)
}

fn dump(_cfg: &Config, table: &SymbolTable) -> SdResult<()> {
    let data = ron::ser::to_string_pretty(table, ron::ser::PrettyConfig::default())
        .map_err(anyhow::Error::from)?;
    println!("{}", data);
    Ok(())
}
