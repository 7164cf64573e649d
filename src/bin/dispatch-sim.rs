use dispatch_sim::config::{self, FormatArg, Invocation};
use dispatch_sim::error::Result;
use dispatch_sim::output::{self, Formatter, HumanFormatter, JsonFormatter, SummaryFormatter};
use dispatch_sim::sim;
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = config::parse_args()?;
    match config::build_invocation(args)? {
        Invocation::Run { config, format } => {
            let result = sim::run_simulation(&config)?;
            let formatter = formatter_for(&format);
            print!("{}", formatter.write(&result));
        }
        Invocation::ShowConfig { config } => print!("{}", output::describe_config(&config)),
        Invocation::ListHandleTimes => print!("{}", output::describe_handle_times()),
    }
    Ok(())
}

fn formatter_for(format: &FormatArg) -> Box<dyn Formatter> {
    match format {
        FormatArg::Human => Box::new(HumanFormatter),
        FormatArg::Summary => Box::new(SummaryFormatter),
        FormatArg::Json => Box::new(JsonFormatter),
    }
}
