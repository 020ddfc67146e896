//! Entry point for the `dispatch` command-line interface.
#![forbid(unsafe_code)]

use dispatch_cli::CliError;

fn main() {
    env_logger::init();
    match dispatch_cli::run() {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            #[expect(clippy::print_stderr, reason = "the binary reports failures on stderr")]
            {
                eprintln!("dispatch: {err}");
            }
            std::process::exit(1);
        }
    }
}
