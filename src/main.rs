#[cfg(not(any(feature = "cli")))]
fn main() {}

#[cfg(feature = "cli")]
fn main() {
    if let Err(err) = symdbg::cli::init(&symdbg::core::config::CFG) {
        eprintln!("{}", console::style(err).red());
        std::process::exit(1);
    }
}
