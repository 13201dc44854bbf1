//! refdict CLI - resolve references in configuration files
//!
//! Usage:
//!   refdict resolve base.yaml local.yaml --set dataset=lastfm
//!   refdict get config.yaml load.dev_path
//!   refdict check config.yaml

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use refdict_core::{Document, ParseOptions, SourceRegistry, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// refdict - resolve ${path} references in YAML and JSON configuration
#[derive(Parser)]
#[command(name = "refdict")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log resolution progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve configuration files and print the result
    Resolve {
        /// Configuration file(s), merged in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format: yaml, json
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Override a value before resolving (e.g., --set load.split=dev)
        #[arg(short, long = "set", value_name = "PATH=VALUE", value_parser = parse_override)]
        set: Vec<(String, Value)>,

        /// Leave references that cannot be found in place instead of failing
        #[arg(long)]
        lenient: bool,

        /// Number of resolution passes (0 repeats until nothing changes)
        #[arg(long, default_value_t = 1)]
        iterations: usize,

        /// Accept ${path:default} fallbacks
        #[arg(long)]
        defaults: bool,

        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Get a specific value from the configuration
    Get {
        /// Configuration file(s)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Path to the value (e.g., load.dev_path)
        path: String,

        /// Show the value as written, without resolving references
        #[arg(long)]
        raw: bool,

        /// Output format: text, json, yaml
        #[arg(short, long, default_value = "text")]
        format: String,

        #[command(flatten)]
        sources: SourceArgs,
    },

    /// Check placeholder syntax and report references that cannot be resolved
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        sources: SourceArgs,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Where the built-in sources (rand, env) are mounted
    #[arg(long, default_value = "utils", value_name = "PATH")]
    mount: String,

    /// Do not mount the built-in sources
    #[arg(long)]
    no_sources: bool,
}

/// Run the CLI with the process arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Resolve {
            files,
            format,
            set,
            lenient,
            iterations,
            defaults,
            output,
            sources,
        } => {
            let options = ParseOptions::default()
                .with_strict(!lenient)
                .with_iterations(iterations)
                .with_defaults(defaults);
            cmd_resolve(&files, &format, set, options, output, &sources)
        }

        Commands::Get {
            files,
            path,
            raw,
            format,
            sources,
        } => cmd_get(&files, &path, raw, &format, &sources),

        Commands::Check { files, sources } => cmd_check(&files, &sources),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    // Ignore the error if a subscriber is already installed
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Parse `PATH=VALUE`, reading VALUE as a YAML scalar
fn parse_override(text: &str) -> Result<(String, Value), String> {
    let (path, raw) = text
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=VALUE, got '{}'", text))?;
    let path = path.trim();
    refdict_core::Path::parse(path).map_err(|e| e.to_string())?;

    let value = serde_yaml::from_str::<Value>(raw).unwrap_or_else(|_| Value::from(raw));
    Ok((path.to_string(), value))
}

fn load_document(files: &[PathBuf], sources: &SourceArgs) -> Result<Document, String> {
    if files.is_empty() {
        return Err("No configuration files specified".to_string());
    }

    let mut doc = Document::load_merged(files).map_err(|e| format!("Failed to load: {}", e))?;

    if !sources.no_sources {
        doc.mount_registry(&sources.mount, &SourceRegistry::with_builtins())
            .map_err(|e| format!("Failed to mount sources at '{}': {}", sources.mount, e))?;
    }

    Ok(doc)
}

fn cmd_resolve(
    files: &[PathBuf],
    format: &str,
    overrides: Vec<(String, Value)>,
    options: ParseOptions,
    output: Option<PathBuf>,
    sources: &SourceArgs,
) -> ExitCode {
    let mut doc = match load_document(files, sources) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    for (path, value) in overrides {
        if let Err(e) = doc.set(&path, value) {
            eprintln!("{}: cannot set '{}': {}", "Error".red(), path, e);
            return ExitCode::from(2);
        }
    }

    let report = match doc.with_options(options).resolve_report() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} Resolution failed\n", "✗".red());
            eprintln!("{}", e);
            return ExitCode::from(1);
        }
    };

    if !report.is_complete() {
        eprintln!(
            "{} {} reference(s) left unresolved",
            "!".yellow(),
            report.unresolved.len()
        );
    }

    let value = strip_sources(report.value);
    let rendered = match format {
        "json" => serde_json::to_string_pretty(&value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        _ => serde_yaml::to_string(&value).map_err(|e| e.to_string()),
    };

    match rendered {
        Ok(content) => write_output(&content, output),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_get(
    files: &[PathBuf],
    path: &str,
    raw: bool,
    format: &str,
    sources: &SourceArgs,
) -> ExitCode {
    let doc = match load_document(files, sources) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    let result = if raw {
        doc.raw().get_path(path).map(|v| v.into_owned())
    } else {
        doc.get(path)
    };

    let value = match result {
        Ok(value) => value,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(1);
        }
    };

    let rendered = match format {
        "json" => serde_json::to_string_pretty(&value)
            .map(|s| s + "\n")
            .map_err(|e| e.to_string()),
        "yaml" => serde_yaml::to_string(&value).map_err(|e| e.to_string()),
        _ => match &value {
            Value::Null => Ok("null\n".to_string()),
            Value::Sequence(_) | Value::Mapping(_) => {
                serde_yaml::to_string(&value).map_err(|e| e.to_string())
            }
            scalar => Ok(format!("{}\n", scalar.render_inline())),
        },
    };

    match rendered {
        Ok(content) => {
            print!("{}", content);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::from(1)
        }
    }
}

fn cmd_check(files: &[PathBuf], sources: &SourceArgs) -> ExitCode {
    let mut worst: u8 = 0;

    for file in files {
        let doc = match load_document(std::slice::from_ref(file), sources) {
            Ok(d) => d.with_options(ParseOptions::lenient()),
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                worst = 2;
                continue;
            }
        };

        match doc.resolve_report() {
            Ok(report) if report.is_complete() => {
                println!("{} {}: all references resolve", "✓".green(), file.display());
            }
            Ok(report) => {
                eprintln!(
                    "{} {}: {} unresolved reference(s)",
                    "✗".red(),
                    file.display(),
                    report.unresolved.len()
                );
                for entry in &report.unresolved {
                    eprintln!("    {}: ${{{}}}", entry.location, entry.reference);
                }
                worst = worst.max(1);
            }
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                worst = worst.max(1);
            }
        }
    }

    ExitCode::from(worst)
}

fn write_output(content: &str, output: Option<PathBuf>) -> ExitCode {
    match output {
        Some(output_path) => {
            if let Err(e) = std::fs::write(&output_path, content) {
                eprintln!("{}: {}", "Error writing file".red(), e);
                return ExitCode::from(2);
            }
            eprintln!("{} Wrote to {}", "✓".green(), output_path.display());
        }
        None => print!("{}", content),
    }
    ExitCode::SUCCESS
}

/// Drop mounted sources from a resolved tree before printing it
///
/// Mappings left empty by the removal are dropped too.
fn strip_sources(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .filter(|(_, v)| !v.is_dynamic())
                .filter_map(|(k, v)| {
                    let held_sources = v
                        .as_mapping()
                        .is_some_and(|m| m.values().any(Value::is_dynamic));
                    let v = strip_sources(v);
                    let emptied = v.as_mapping().is_some_and(|m| m.is_empty());
                    (!(held_sources && emptied)).then_some((k, v))
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(
            seq.into_iter()
                .filter(|v| !v.is_dynamic())
                .map(strip_sources)
                .collect(),
        ),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn builtin_sources() -> SourceArgs {
        SourceArgs {
            mount: "utils".to_string(),
            no_sources: false,
        }
    }

    fn resolve_to(files: &[PathBuf], output: &std::path::Path) -> ExitCode {
        cmd_resolve(
            files,
            "yaml",
            Vec::new(),
            ParseOptions::default(),
            Some(output.to_path_buf()),
            &builtin_sources(),
        )
    }

    #[test]
    fn test_resolve_writes_resolved_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_file(
            &dir,
            "config.yaml",
            "dataset: spotify\nstore: data/${dataset}\nid: ${utils.rand.8}\n",
        );
        let output = dir.path().join("out.yaml");

        assert_eq!(resolve_to(&[config], &output), ExitCode::SUCCESS);

        let written: Value =
            serde_yaml::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["store"].as_str(), Some("data/spotify"));
        assert_eq!(written["id"].as_str().map(str::len), Some(8));
        assert!(written.get("utils").is_none());
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_file(&dir, "config.yaml", "port: 1\nurl: host:${port}\n");
        let output = dir.path().join("out.json");

        let code = cmd_resolve(
            &[config],
            "json",
            vec![parse_override("port=8080").unwrap()],
            ParseOptions::default(),
            Some(output.clone()),
            &builtin_sources(),
        );
        assert_eq!(code, ExitCode::SUCCESS);

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["port"], Value::Integer(8080));
        assert_eq!(written["url"].as_str(), Some("host:8080"));
    }

    #[test]
    fn test_resolve_missing_file_exits_2() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.yaml");
        let code = resolve_to(&[dir.path().join("absent.yaml")], &output);

        assert_eq!(code, ExitCode::from(2));
        assert!(!output.exists());
    }

    #[test]
    fn test_resolve_failures_exit_1() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = write_file(&dir, "cycle.yaml", "a: ${b}\nb: ${a}\n");
        let missing = write_file(&dir, "missing.yaml", "a: ${nope}\n");
        let output = dir.path().join("out.yaml");

        assert_eq!(resolve_to(&[cycle], &output), ExitCode::from(1));
        assert_eq!(resolve_to(&[missing], &output), ExitCode::from(1));
        assert!(!output.exists());
    }

    #[test]
    fn test_resolve_lenient_succeeds_with_missing_reference() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_file(&dir, "config.yaml", "a: ${nope}\n");
        let output = dir.path().join("out.yaml");

        let code = cmd_resolve(
            &[config],
            "yaml",
            Vec::new(),
            ParseOptions::lenient(),
            Some(output.clone()),
            &builtin_sources(),
        );
        assert_eq!(code, ExitCode::SUCCESS);

        let written: Value =
            serde_yaml::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["a"].as_str(), Some("${nope}"));
    }

    #[test]
    fn test_get_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_file(&dir, "good.yaml", "name: x\ncopy: ${name}\n");
        let broken = write_file(&dir, "broken.yaml", "name: x\nbad: ${gone}\n");
        let sources = builtin_sources();

        assert_eq!(
            cmd_get(&[good.clone()], "copy", false, "text", &sources),
            ExitCode::SUCCESS
        );
        assert_eq!(
            cmd_get(&[good], "absent", true, "text", &sources),
            ExitCode::from(1)
        );
        assert_eq!(
            cmd_get(&[broken.clone()], "name", false, "text", &sources),
            ExitCode::from(1)
        );
        assert_eq!(
            cmd_get(&[broken], "bad", true, "json", &sources),
            ExitCode::SUCCESS
        );
        assert_eq!(
            cmd_get(&[dir.path().join("absent.yaml")], "name", false, "text", &sources),
            ExitCode::from(2)
        );
    }

    #[test]
    fn test_check_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_file(&dir, "good.yaml", "a: 1\nb: ${a}\nid: ${utils.rand.4}\n");
        let unresolved = write_file(&dir, "unresolved.yaml", "a: ${nope}\n");
        let cycle = write_file(&dir, "cycle.yaml", "a: ${b}\nb: ${a}\n");
        let malformed = write_file(&dir, "malformed.yaml", "a: ${.b}\n");
        let absent = dir.path().join("absent.yaml");
        let sources = builtin_sources();

        assert_eq!(cmd_check(&[good.clone()], &sources), ExitCode::SUCCESS);
        assert_eq!(cmd_check(&[unresolved.clone()], &sources), ExitCode::from(1));
        assert_eq!(cmd_check(&[cycle], &sources), ExitCode::from(1));
        assert_eq!(cmd_check(&[malformed], &sources), ExitCode::from(1));
        assert_eq!(cmd_check(&[good.clone(), absent], &sources), ExitCode::from(2));
        assert_eq!(cmd_check(&[good, unresolved], &sources), ExitCode::from(1));
    }

    #[test]
    fn test_check_without_sources_reports_source_references() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_file(&dir, "config.yaml", "id: ${utils.rand.4}\n");
        let sources = SourceArgs {
            mount: "utils".to_string(),
            no_sources: true,
        };

        assert_eq!(cmd_check(&[config], &sources), ExitCode::from(1));
    }

    #[test]
    fn test_parse_override_types() {
        let (path, value) = parse_override("server.port=8080").unwrap();
        assert_eq!(path, "server.port");
        assert_eq!(value, Value::Integer(8080));

        assert_eq!(parse_override("a=true").unwrap().1, Value::Bool(true));
        assert_eq!(parse_override("a=x=y").unwrap().1, Value::from("x=y"));
        assert_eq!(parse_override("a=[1, 2]").unwrap().1, Value::from(vec![1i64, 2]));
    }

    #[test]
    fn test_parse_override_rejects_bad_input() {
        assert!(parse_override("no-equals").is_err());
        assert!(parse_override(".a=1").is_err());
    }

    #[test]
    fn test_strip_sources() {
        let mut tree: Value = serde_yaml::from_str("a: 1\nutils:\n  keep: x\nother: {}").unwrap();
        let mut doc = Document::new(tree.clone());
        doc.mount_registry("utils", &SourceRegistry::with_builtins())
            .unwrap();
        doc.mount_registry("only", &SourceRegistry::with_builtins())
            .unwrap();

        tree = strip_sources(doc.raw().clone());
        let expected: Value =
            serde_yaml::from_str("a: 1\nutils:\n  keep: x\nother: {}").unwrap();
        assert_eq!(tree, expected);
    }

    #[test]
    fn test_cli_parses_resolve_flags() {
        let cli = Cli::try_parse_from([
            "refdict",
            "resolve",
            "a.yaml",
            "b.yaml",
            "--set",
            "x=1",
            "--lenient",
            "--iterations",
            "0",
            "--no-sources",
        ])
        .unwrap();

        match cli.command {
            Commands::Resolve {
                files,
                set,
                lenient,
                iterations,
                sources,
                ..
            } => {
                assert_eq!(files.len(), 2);
                assert_eq!(set, vec![("x".to_string(), Value::Integer(1))]);
                assert!(lenient);
                assert_eq!(iterations, 0);
                assert!(sources.no_sources);
            }
            _ => panic!("expected resolve"),
        }
    }

    #[test]
    fn test_cli_parses_get() {
        let cli = Cli::try_parse_from(["refdict", "get", "a.yaml", "load.path", "--raw"]).unwrap();
        match cli.command {
            Commands::Get {
                files, path, raw, sources, ..
            } => {
                assert_eq!(files, vec![PathBuf::from("a.yaml")]);
                assert_eq!(path, "load.path");
                assert!(raw);
                assert_eq!(sources.mount, "utils");
            }
            _ => panic!("expected get"),
        }
    }
}
