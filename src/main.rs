use std::io::Read;

use clap::{ArgAction, Parser};
use text_token_filter::{
    EngineConfig, FilterOptions, Grammar, MemoryStore, ResolutionContext, TextFilter, Viewer,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Simple runner: filter text against a JSON fixture.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON fixture with profiles, courses, roles and metadata
    #[arg(long)]
    data: String,
    /// JSON engine configuration (optional)
    #[arg(long)]
    config: Option<String>,
    /// Token grammar: simple or namespaced (overrides the config)
    #[arg(long)]
    grammar: Option<Grammar>,
    /// Viewer account id
    #[arg(long, conflicts_with = "anonymous")]
    viewer: Option<u64>,
    /// Render as a guest
    #[arg(long)]
    anonymous: bool,
    /// Current course id
    #[arg(long)]
    scope: Option<u64>,
    /// More logging (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Text to filter; read from stdin when omitted
    text: Option<String>,
}

fn read_file(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Cannot read {path}: {e}");
            std::process::exit(1);
        }
    }
}

fn main() {
    // Parse CLI arguments.
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Cannot install logger: {e}");
    }

    // Load fixture and configuration.
    let store = match MemoryStore::from_json(&read_file(&args.data)) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Invalid fixture: {e}");
            std::process::exit(1);
        }
    };
    let mut config = match args.config.as_deref().map(|p| EngineConfig::from_json(&read_file(p))) {
        None => EngineConfig::default(),
        Some(Ok(c)) => c,
        Some(Err(e)) => {
            eprintln!("Invalid config: {e}");
            std::process::exit(1);
        }
    };
    if let Some(g) = args.grammar {
        config = config.with_grammar(g);
    }

    // Input text.
    let text = match args.text {
        Some(t) => t,
        None => {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("Cannot read stdin: {e}");
                std::process::exit(1);
            }
            buf
        }
    };

    let viewer = match (args.anonymous, args.viewer) {
        (false, Some(id)) => Viewer::Authenticated(id),
        _ => Viewer::Anonymous,
    };
    let ctx = ResolutionContext::new(viewer, args.scope, &store);
    let mut filter = TextFilter::new(ctx, config);

    print!("{}", filter.filter(&text, &FilterOptions::default()));
}
