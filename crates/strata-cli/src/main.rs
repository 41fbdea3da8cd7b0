use serde::Serialize;
use std::io::Read;
use strata::{
    Direction, GraphSnapshot, LayoutConfig, NamedGraph, Origin, SocketAlignment, arrange,
    arrange_all, recenter, recenter_all,
};

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Layout(strata::Error),
    Json(serde_json::Error),
    Batch { failed: usize, total: usize },
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Layout(err) => write!(f, "{err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Batch { failed, total } => {
                write!(f, "{failed} of {total} graphs could not be processed")
            }
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<strata::Error> for CliError {
    fn from(value: strata::Error) -> Self {
        Self::Layout(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, Default)]
enum Command {
    #[default]
    Arrange,
    Recenter,
    Batch,
}

/// Command line overrides applied on top of the loaded configuration.
#[derive(Debug, Default)]
struct Overrides {
    iterations: Option<usize>,
    direction: Option<Direction>,
    socket_alignment: Option<SocketAlignment>,
    origin: Option<Origin>,
    no_reroutes: bool,
    stack_collapsed: bool,
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    input: Option<String>,
    config: Option<String>,
    overrides: Overrides,
    apply: bool,
    batch_recenter: bool,
    pretty: bool,
    out: Option<String>,
}

fn usage() -> &'static str {
    "strata-cli\n\
\n\
USAGE:\n\
  strata-cli [arrange] [--config <path>] [--iterations <n>] [--direction <dir>] [--socket-alignment none|moderate|full] [--no-reroutes] [--stack-collapsed] [--apply] [--pretty] [--out <path>] [<path>|-]\n\
  strata-cli recenter [--origin center|active-output|active-node] [--apply] [--pretty] [--out <path>] [<path>|-]\n\
  strata-cli batch [--recenter] [--config <path>] [<layout flags>] [--pretty] [--out <path>] [<path>|-]\n\
\n\
NOTES:\n\
  - If <path> is omitted or '-', input is read from stdin.\n\
  - arrange and recenter read one graph snapshot and print the computed arrangement;\n\
    --apply prints the updated snapshot instead.\n\
  - batch reads a JSON array of {\"name\", \"snapshot\"} objects, processes every element of\n\
    every graph and prints the updated array. Failing graphs are reported on stderr.\n\
  - <dir> is one of balanced, bottom-left, bottom-right, top-left, top-right.\n\
  - Set RUST_LOG (e.g. RUST_LOG=strata=debug) to see pipeline logs on stderr.\n\
"
}

fn next_value<'a>(it: &mut impl Iterator<Item = &'a String>) -> Result<&'a str, CliError> {
    it.next()
        .map(String::as_str)
        .ok_or(CliError::Usage(usage()))
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "arrange" => args.command = Command::Arrange,
            "recenter" => args.command = Command::Recenter,
            "batch" => args.command = Command::Batch,
            "--pretty" => args.pretty = true,
            "--apply" => args.apply = true,
            "--recenter" => args.batch_recenter = true,
            "--no-reroutes" => args.overrides.no_reroutes = true,
            "--stack-collapsed" => args.overrides.stack_collapsed = true,
            "--config" => args.config = Some(next_value(&mut it)?.to_string()),
            "--out" => args.out = Some(next_value(&mut it)?.to_string()),
            "--iterations" => {
                let n = next_value(&mut it)?
                    .parse::<usize>()
                    .map_err(|_| CliError::Usage(usage()))?;
                args.overrides.iterations = Some(n);
            }
            "--direction" => {
                let d = Direction::parse(next_value(&mut it)?).ok_or(CliError::Usage(usage()))?;
                args.overrides.direction = Some(d);
            }
            "--socket-alignment" => {
                let s = SocketAlignment::parse(next_value(&mut it)?)
                    .ok_or(CliError::Usage(usage()))?;
                args.overrides.socket_alignment = Some(s);
            }
            "--origin" => {
                let o = Origin::parse(next_value(&mut it)?).ok_or(CliError::Usage(usage()))?;
                args.overrides.origin = Some(o);
            }
            other if other.starts_with('-') && other != "-" => {
                return Err(CliError::Usage(usage()));
            }
            path => {
                if args.input.is_some() {
                    return Err(CliError::Usage(usage()));
                }
                args.input = Some(path.to_string());
            }
        }
    }

    Ok(args)
}

fn read_input(input: Option<&str>) -> Result<String, CliError> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            Ok(buf)
        }
        Some(path) => Ok(std::fs::read_to_string(path)?),
    }
}

fn write_json(value: &impl Serialize, pretty: bool, out: Option<&str>) -> Result<(), CliError> {
    let mut text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    text.push('\n');
    match out {
        None => print!("{text}"),
        Some(path) => std::fs::write(path, text)?,
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<LayoutConfig, CliError> {
    let mut config = match args.config.as_deref() {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => LayoutConfig::default(),
    };

    let o = &args.overrides;
    if let Some(n) = o.iterations {
        config.iterations = n;
    }
    if let Some(d) = o.direction {
        config.direction = d;
    }
    if let Some(s) = o.socket_alignment {
        config.socket_alignment = s;
    }
    if let Some(origin) = o.origin {
        config.origin = origin;
    }
    if o.no_reroutes {
        config.add_reroutes = false;
    }
    if o.stack_collapsed {
        config.stack_collapsed = true;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<(), CliError> {
    let config = load_config(&args)?;
    let text = read_input(args.input.as_deref())?;
    let out = args.out.as_deref();

    match args.command {
        Command::Arrange | Command::Recenter => {
            let mut snapshot = GraphSnapshot::from_json(&text)?;
            let arrangement = match args.command {
                Command::Recenter => recenter(&snapshot, config.origin)?,
                _ => arrange(&snapshot, &config)?,
            };
            for diagnostic in &arrangement.diagnostics {
                tracing::warn!(?diagnostic, "layout diagnostic");
            }
            if args.apply {
                snapshot.apply(&arrangement);
                write_json(&snapshot, args.pretty, out)
            } else {
                write_json(&arrangement, args.pretty, out)
            }
        }
        Command::Batch => {
            let mut graphs: Vec<NamedGraph> = serde_json::from_str(&text)?;
            let report = if args.batch_recenter {
                recenter_all(&mut graphs, config.origin)
            } else {
                arrange_all(&mut graphs, &config)
            };
            write_json(&graphs, args.pretty, out)?;

            for failure in &report.failures {
                eprintln!("{}: {}", failure.graph, failure.error);
            }
            if report.is_success() {
                Ok(())
            } else {
                Err(CliError::Batch {
                    failed: report.failures.len(),
                    total: graphs.len(),
                })
            }
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_tracing();

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
