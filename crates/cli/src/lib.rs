use clap::{Args, Parser, Subcommand, ValueEnum};
use common::DataType;
use observability::LogFormat;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "moduleqc")]
#[command(about = "Fetch, mirror and plot detector-module QC measurements")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file (built-in defaults are used if it does not exist)
    #[arg(
        short,
        long,
        global = true,
        env = "MODULEQC_CONFIG",
        default_value = "qc_config/moduleqc.yaml"
    )]
    pub config: PathBuf,

    /// Log output format (pretty, json, compact)
    #[arg(long, global = true, default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export test records from a MAC database to CSV
    Fetch {
        #[command(flatten)]
        query: MacQueryArgs,

        /// Directory for the CSV file (defaults to the configured output_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Print test records from a MAC database, or plot their IV curves
    Compare {
        #[command(flatten)]
        query: MacQueryArgs,

        #[command(flatten)]
        plot: PlotArgs,
    },

    /// Copy the latest IV test of a module from a MAC into the local database
    Mirror {
        /// MAC to read from (e.g. CMU, UCSB)
        #[arg(short, long)]
        mac: String,

        /// Module name (e.g. 320-ML-F3TC-CM-0102)
        #[arg(short = 'n', long)]
        module_name: String,
    },

    /// Upload IV text files measured locally into the local database
    Upload {
        /// Directory containing IV test data text files
        #[arg(short, long)]
        directory: PathBuf,

        /// Only upload files belonging to this module
        #[arg(short = 'n', long)]
        module_name: Option<String>,

        /// Temperature (°C) for every file, skips the prompt
        #[arg(long)]
        temperature: Option<f64>,

        /// Relative humidity (%) for every file, skips the prompt
        #[arg(long)]
        rel_hum: Option<f64>,

        /// Comment stored with every file
        #[arg(long)]
        comments: Option<String>,

        /// Never prompt; use flags or configured defaults
        #[arg(long)]
        no_prompt: bool,
    },

    /// Print records from the local module_tests table
    ReadLocal {
        /// Only show records for this module
        #[arg(short = 'n', long)]
        module_name: Option<String>,
    },

    /// Create the local database and module_tests table
    InitLocal {
        /// Database name (defaults to local_database.database)
        #[arg(long)]
        database: Option<String>,
    },

    /// Plot a module's IV curves across the configured measurement conditions
    Study {
        /// Module to process (all configured studies if omitted)
        #[arg(short = 'n', long)]
        module_name: Option<String>,

        /// File name for the plot inside the study's first data directory
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Configuration file helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a configuration file with all defaults
    Init {
        /// Output path for the new configuration file
        #[arg(short, long, default_value = "qc_config/moduleqc.yaml")]
        output: PathBuf,
    },

    /// Validate the configuration file given by --config
    Validate,
}

/// Selection of records in a MAC database
#[derive(Args, Debug, Clone)]
pub struct MacQueryArgs {
    /// MAC: CMU, UCSB
    #[arg(short, long)]
    pub mac: String,

    /// mod_iv, mod_ped, mod_qcs
    #[arg(short = 't', long, value_parser = parse_data_type)]
    pub data_type: Option<DataType>,

    /// Module name(s) separated by spaces; ALL or none selects every module
    #[arg(short = 'n', long, num_args = 1..)]
    pub module_names: Vec<String>,

    /// List all module names for the MAC instead of fetching records
    #[arg(long)]
    pub list_modules: bool,
}

#[derive(Args, Debug, Clone)]
pub struct PlotArgs {
    /// Plot IV data (only for mod_iv)
    #[arg(long)]
    pub plot: bool,

    /// IV text file(s) to overlay on the plot
    #[arg(long = "reference", num_args = 1..)]
    pub references: Vec<PathBuf>,

    /// Legend label for each reference file, in order
    #[arg(long = "reference-label", num_args = 1..)]
    pub reference_labels: Vec<String>,

    /// Logarithmic current axis with the configured fixed ranges
    #[arg(long)]
    pub log_scale: bool,

    /// Legend label style for database curves
    #[arg(long, value_enum, default_value = "test")]
    pub labels: LabelStyle,

    /// Directory for the PNG file (defaults to the configured output_dir)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelStyle {
    /// "<module> (Test <n>)"
    Test,
    /// "<MAC> (Test <i>)- <RH>% RH, <T>°C, <date> <time>"
    Conditions,
}

fn parse_data_type(s: &str) -> Result<DataType, String> {
    s.parse::<DataType>().map_err(|e| e.to_string())
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_args() {
        let cli = Cli::try_parse_from([
            "moduleqc", "fetch", "-m", "CMU", "-t", "mod_iv", "-n", "mod-a", "mod-b",
        ])
        .unwrap();

        match cli.command {
            Commands::Fetch { query, output_dir } => {
                assert_eq!(query.mac, "CMU");
                assert_eq!(query.data_type, Some(DataType::ModIv));
                assert_eq!(query.module_names, vec!["mod-a", "mod-b"]);
                assert!(!query.list_modules);
                assert!(output_dir.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_unknown_data_type_rejected() {
        let result = Cli::try_parse_from(["moduleqc", "fetch", "-m", "CMU", "-t", "iv"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_compare_plot_args() {
        let cli = Cli::try_parse_from([
            "moduleqc",
            "compare",
            "-m",
            "ucsb",
            "-t",
            "mod_iv",
            "--plot",
            "--log-scale",
            "--labels",
            "conditions",
            "--reference",
            "a.txt",
            "b.txt",
        ])
        .unwrap();

        match cli.command {
            Commands::Compare { query, plot } => {
                assert_eq!(query.mac, "ucsb");
                assert!(plot.plot);
                assert!(plot.log_scale);
                assert_eq!(plot.labels, LabelStyle::Conditions);
                assert_eq!(plot.references.len(), 2);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from([
            "moduleqc",
            "read-local",
            "--config",
            "other.yaml",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("other.yaml"));
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(matches!(
            cli.command,
            Commands::ReadLocal { module_name: None }
        ));
    }
}
