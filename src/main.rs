use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use dexweave::archive::{record_class_entries, ArchivePruner};
use dexweave::classpath::Classpath;
use dexweave::config::Config;
use dexweave::introspect::RuntimeIntrospector;
use dexweave::shrink::effective_rules;
use dexweave::variant::package_from_manifest;

/// dexweave - joint Kotlin/Java compilation and test-aware shrinking for
/// Android-style builds
#[derive(Parser, Debug)]
#[command(name = "dexweave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect the Kotlin runtime version carried by a classpath
    Inspect {
        /// Platform-separator-joined classpath (as handed to a compiler)
        classpath: String,
    },

    /// Print the effective shrink rule text for a test variant
    Rules {
        /// Package identifier of the tested variant
        #[arg(long, required_unless_present = "manifest")]
        tested_package: Option<String>,

        /// AndroidManifest.xml to read the tested package from instead
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,

        /// Package identifier of the test variant
        /// (defaults to `<tested package>.test`)
        #[arg(long)]
        test_package: Option<String>,

        /// Variant name, for looking up a configured rule override
        #[arg(long)]
        variant: Option<String>,

        /// Rule file replacing the default block (overrides config lookup)
        #[arg(long, value_name = "FILE")]
        override_file: Option<PathBuf>,
    },

    /// List the class entry keys a compile output directory would record
    Record {
        /// Compile output directory to walk
        dir: PathBuf,
    },

    /// Remove a test compile output's classes from shrunk archives
    Prune {
        /// Archive to prune (can be specified multiple times)
        #[arg(long = "archive", value_name = "JAR", required = true)]
        archives: Vec<PathBuf>,

        /// Test variant's compile output directory to record and remove
        #[arg(long, value_name = "DIR")]
        test_classes: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = load_config(&cli)?;
    config.validate().into_diagnostic()?;

    match cli.command {
        Command::Inspect { classpath } => inspect(&classpath),
        Command::Rules {
            tested_package,
            manifest,
            test_package,
            variant,
            override_file,
        } => rules(
            &config,
            tested_package,
            manifest,
            test_package,
            variant.as_deref(),
            override_file,
        ),
        Command::Record { dir } => record(&dir),
        Command::Prune {
            archives,
            test_classes,
        } => prune(&archives, &test_classes, cli.quiet),
    }
}

fn inspect(classpath: &str) -> Result<()> {
    let classpath = Classpath::from_joined(classpath);
    match RuntimeIntrospector::new().detect(&classpath).into_diagnostic()? {
        Some(version) => {
            println!("{}", format!("Kotlin runtime {}", version).green());
            println!("  requested dependency: kotlin-compiler:{}", version);
        }
        None => {
            println!("{}", "No Kotlin runtime on classpath".yellow());
        }
    }
    Ok(())
}

fn rules(
    config: &Config,
    tested_package: Option<String>,
    manifest: Option<PathBuf>,
    test_package: Option<String>,
    variant: Option<&str>,
    override_file: Option<PathBuf>,
) -> Result<()> {
    let tested = match (tested_package, manifest) {
        (Some(package), _) => package,
        (None, Some(path)) => package_from_manifest(&path).into_diagnostic()?,
        (None, None) => unreachable!("clap enforces one of the two"),
    };
    let test = test_package.unwrap_or_else(|| format!("{}.test", tested));

    let override_path = override_file.or_else(|| {
        variant.and_then(|v| config.rule_override_for(v).map(|p| p.to_path_buf()))
    });
    let text =
        effective_rules(override_path.as_deref(), &test, &tested).into_diagnostic()?;
    print!("{}", text);
    Ok(())
}

fn record(dir: &PathBuf) -> Result<()> {
    let recorded = record_class_entries(dir).into_diagnostic()?;
    for key in &recorded {
        println!("{}", key);
    }
    eprintln!(
        "{}",
        format!("{} class entr(ies) under {}", recorded.len(), dir.display()).dimmed()
    );
    Ok(())
}

fn prune(archives: &[PathBuf], test_classes: &PathBuf, quiet: bool) -> Result<()> {
    let recorded = record_class_entries(test_classes).into_diagnostic()?;
    let report = ArchivePruner::new()
        .prune(archives, &recorded)
        .into_diagnostic()?;

    if !quiet {
        for (archive, removed) in &report.removed {
            println!(
                "  {} {} ({} entries removed)",
                "✓".green(),
                archive.display(),
                removed
            );
        }
        println!(
            "{}",
            format!("Removed {} entr(ies) total", report.total_removed()).dimmed()
        );
    }
    Ok(())
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::from_file(path),
        None => Config::from_default_locations(&std::env::current_dir().into_diagnostic()?),
    }
}
