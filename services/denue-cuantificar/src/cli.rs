//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use denue::areas::DEFAULT_KEY_COLUMN;

#[derive(Debug, Parser)]
#[command(
    name = "denue-cuantificar",
    version,
    about = "Count DENUE economic units by activity, area and size stratum"
)]
pub struct Cli {
    /// TOML config file (default: denue-cuantificar.toml if present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Query the API and write the counts CSV
    Run(RunArgs),
    /// Extract 5-digit area codes from a Latin-1 geostatistical catalog
    ExtractAreas(ExtractAreasArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// "0" to discover every activity, or a comma list such as "11,21,46"
    #[arg(short = 'r', long = "ramos", default_value = "0")]
    pub activities: String,

    /// Area file (one code per line) or a comma list such as "01001,09009"
    #[arg(short = 'a', long, default_value = "municipios.txt")]
    pub area: String,

    /// Size strata 1-7, comma separated
    #[arg(short = 'e', long = "estratos", default_value = "1,2,3,4,5,6,7")]
    pub strata: String,

    /// API tokens, comma separated (overrides DENUE_TOKENS and pool.tokens_file)
    #[arg(short = 't', long)]
    pub tokens: Option<String>,

    /// Concurrent requests; about twice the number of tokens works well
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Output CSV path
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Write a Prometheus textfile snapshot here when the run ends
    #[arg(long, value_name = "PATH")]
    pub metrics_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ExtractAreasArgs {
    /// Tab-separated catalog, Latin-1 encoded
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Output file, one code per line
    #[arg(short = 'o', long, default_value = "municipios.txt")]
    pub output: PathBuf,

    /// Catalog column holding the area key
    #[arg(short = 'c', long, default_value = DEFAULT_KEY_COLUMN)]
    pub column: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_defaults() {
        let cli = Cli::try_parse_from(["denue-cuantificar", "run"]).unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.activities, "0");
        assert_eq!(args.area, "municipios.txt");
        assert_eq!(args.strata, "1,2,3,4,5,6,7");
        assert!(args.tokens.is_none());
        assert!(args.workers.is_none());
        assert!(args.output.is_none());
        assert!(cli.config.is_none());
    }

    #[test]
    fn run_short_flags() {
        let cli = Cli::try_parse_from([
            "denue-cuantificar",
            "run",
            "-r",
            "11,46",
            "-a",
            "01001,09009",
            "-e",
            "1,2",
            "-t",
            "t1,t2",
            "-w",
            "4",
            "-o",
            "out.csv",
            "--config",
            "denue.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("denue.toml")));
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.activities, "11,46");
        assert_eq!(args.area, "01001,09009");
        assert_eq!(args.strata, "1,2");
        assert_eq!(args.tokens.as_deref(), Some("t1,t2"));
        assert_eq!(args.workers, Some(4));
        assert_eq!(args.output, Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn workers_must_be_numeric() {
        assert!(Cli::try_parse_from(["denue-cuantificar", "run", "-w", "many"]).is_err());
    }

    #[test]
    fn extract_areas_requires_input() {
        assert!(Cli::try_parse_from(["denue-cuantificar", "extract-areas"]).is_err());

        let cli = Cli::try_parse_from([
            "denue-cuantificar",
            "extract-areas",
            "--input",
            "AGEEML.txt",
        ])
        .unwrap();
        let Command::ExtractAreas(args) = cli.command else {
            panic!("expected extract-areas");
        };
        assert_eq!(args.input, PathBuf::from("AGEEML.txt"));
        assert_eq!(args.output, PathBuf::from("municipios.txt"));
        assert_eq!(args.column, "CVEGEO");
    }
}
