use tracing_subscriber::EnvFilter;

/// Log to stderr. RUST_LOG wins; otherwise the level follows -q / --verbose.
fn init_tracing(args: &novelscrape::cli::Args) {
    let default = if args.quiet {
        "warn"
    } else if args.verbose {
        "debug,html5ever=error,selectors=error,reqwest=info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = novelscrape::cli::Args::parse();
    init_tracing(&args);
    if let Err(e) = novelscrape::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
