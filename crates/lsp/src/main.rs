use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use editor_lsp_bridge::{resolver, text_edits, to_json, Config, TextSnapshot};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{filter::Directive, EnvFilter};

fn cli() -> Command {
    Command::new("editor-lsp-bridge")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Resolve editor URIs to projects and diff texts into LSP edits")
        .subcommand_required(true)
        .arg(
            Arg::new("log")
                .long("log")
                .global(true)
                .value_name("FILE")
                .help("Write logs to file instead of stderr"),
        )
        .arg(
            Arg::new("options")
                .long("options")
                .global(true)
                .value_name("JSON")
                .help("Bridge options, e.g. '{\"markerExtension\": \"iml\"}'"),
        )
        .subcommand(
            Command::new("resolve")
                .about("Print the project owning a file URI")
                .arg(Arg::new("uri").required(true).value_name("URI")),
        )
        .subcommand(
            Command::new("diff")
                .about("Print the TextEdits turning OLD into NEW")
                .arg(Arg::new("old").required(true).value_name("OLD"))
                .arg(Arg::new("new").required(true).value_name("NEW")),
        )
}

fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let mut config = Config::new();
    if let Some(options) = matches.get_one::<String>("options") {
        let json: serde_json::Value =
            serde_json::from_str(options).context("parsing --options")?;
        config.update(json)?;
    }
    if let Some(log) = matches.get_one::<String>("log") {
        config.update(serde_json::json!({ "logFile": log }))?;
    }
    setup_logging(config.log_file.as_deref());
    tracing::debug!("config: {:?}", config);

    let output = match matches.subcommand() {
        Some(("resolve", args)) => run_resolve(&config, args)?,
        Some(("diff", args)) => run_diff(&config, args)?,
        _ => anyhow::bail!("no subcommand given"),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_resolve(config: &Config, args: &ArgMatches) -> anyhow::Result<serde_json::Value> {
    let uri = required(args, "uri")?;
    let resolved = resolver::resolve(uri, &config.marker_extension)?;
    to_json(resolved)
}

fn run_diff(config: &Config, args: &ArgMatches) -> anyhow::Result<serde_json::Value> {
    let old = snapshot(Path::new(required(args, "old")?))?;
    let new = snapshot(Path::new(required(args, "new")?))?;
    to_json(text_edits(&old, &new, config.comparison_policy))
}

fn required<'a>(args: &'a ArgMatches, id: &str) -> anyhow::Result<&'a str> {
    args.get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing <{}>", id.to_uppercase()))
}

fn snapshot(path: &Path) -> anyhow::Result<TextSnapshot> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Ok(TextSnapshot::new(&text, PathBuf::from(path)))
}

fn setup_logging(file: Option<&Path>) {
    let file = file.and_then(|path| {
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });

    let writer = match file {
        Some(file) => BoxMakeWriter::new(Arc::new(file)),
        None => BoxMakeWriter::new(io::stderr),
    };

    let filter = EnvFilter::builder()
        .with_default_directive(Directive::from(LevelFilter::WARN))
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();
}
