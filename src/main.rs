use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct CliArgs {
    additions: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    let _log_guard = init_logging()?;

    mixtape::app::run_with_startup(mixtape::app::AppStartupOptions {
        additions: args.additions,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    for arg in args {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other if other.starts_with('-') => anyhow::bail!("unknown argument {other}"),
            _ => out.additions.push(arg),
        }
    }
    Ok(out)
}

fn print_help() {
    println!("Mixtape");
    println!("  mixtape [FILE|URL]...");
    println!("  Audio files and http(s) URLs are appended to the restored playlist.");
}

/// Logs go to a file under the config dir. The terminal belongs to the TUI.
fn init_logging() -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let file = mixtape::config::open_log_file()?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}
