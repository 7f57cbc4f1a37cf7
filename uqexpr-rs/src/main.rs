use std::io::{self, BufReader};

use tracing_subscriber::EnvFilter;
use uqexpr::cli;
use uqexpr::error::StartupError;
use uqexpr::session::Session;
use uqexpr::startup::{self, Prepared};

fn main() {
    let filter = EnvFilter::try_from_env("UQEXPR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let prepared = match cli::parse_args()
        .map_err(StartupError::Usage)
        .and_then(startup::prepare)
    {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = ?e, "startup failed");
            eprintln!("{e}");
            std::process::exit(e.exit_code());
        }
    };

    if let Err(e) = run(prepared) {
        tracing::error!(error = %e, "i/o error");
        std::process::exit(1);
    }
}

fn run(p: Prepared) -> io::Result<()> {
    let mut session = Session::new(p.store, p.sig_figs, io::stdout(), io::stderr());
    match p.input {
        Some(file) => {
            session.welcome(false)?;
            session.run(BufReader::new(file))?;
        }
        None => {
            session.welcome(true)?;
            session.run(io::stdin().lock())?;
        }
    }
    session.farewell()
}
