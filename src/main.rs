use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use serde::Serialize;
use slotlens::aggregator::{busiest_ue, SummaryStatistics, UeSeries};
use slotlens::collectors::{merge_logs_to_file, throughput_from_file_name};
use slotlens::config::Config;
use slotlens::correlator::{PairingSpec, ScheduleSummary};
use slotlens::error::ConfigError;
use slotlens::export::{
    write_events_csv, write_intervals_csv, write_json, write_schedule_csv, write_statistics_csv,
};
use slotlens::{AnalysisReport, Analyzer, DurationUnit};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Command-line arguments for the slot timing analyzer
#[derive(Parser)]
#[command(
    name = "slotlens",
    about = "Slot timing analyzer for RAN test-harness logs",
    long_about = "Classifies harness log lines into timestamped events, pairs them into \
                  per-slot intervals, flags anomalous values and writes statistics as \
                  JSON and CSV."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        global = true,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Directory receiving JSON and CSV output
    #[arg(
        short,
        long,
        global = true,
        value_name = "DIR",
        default_value = "."
    )]
    out_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start/stop marker intervals of one or more logs
    Pairs {
        #[arg(required = true, value_name = "LOG")]
        logs: Vec<PathBuf>,
    },
    /// Checkpoint-chain intervals of one or more logs
    Chain {
        #[arg(required = true, value_name = "LOG")]
        logs: Vec<PathBuf>,
    },
    /// Time between consecutive slots
    Cadence {
        #[arg(value_name = "LOG")]
        log: PathBuf,
    },
    /// VNF jitter/delay records and PNF arrival deltas
    Delays {
        #[arg(value_name = "VNF_LOG")]
        vnf: PathBuf,
        #[arg(value_name = "PNF_LOG")]
        pnf: PathBuf,
    },
    /// Allocation sizes per UE
    UeSize {
        #[arg(value_name = "LOG")]
        log: PathBuf,
        /// Report every UE instead of the busiest one
        #[arg(long)]
        all_ues: bool,
        /// Read the offered throughput from the file name (`...-500M.txt`)
        #[arg(long)]
        throughput: bool,
    },
    /// Merge two logs by their bracketed timestamps
    Merge {
        #[arg(value_name = "LOG")]
        first: PathBuf,
        #[arg(value_name = "LOG")]
        second: PathBuf,
        #[arg(short = 'O', long, value_name = "FILE")]
        output: PathBuf,
    },
    /// Uplink/downlink scheduling per frame and slot
    Schedule {
        #[arg(value_name = "LOG")]
        log: PathBuf,
    },
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in load_config
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        if self.out_dir.exists() && !self.out_dir.is_dir() {
            return Err(format!(
                "Output path is not a directory: {}",
                self.out_dir.display()
            ));
        }

        Ok(())
    }

    /// Convert config path to string safely, handling non-UTF-8 paths
    ///
    /// # Returns
    ///
    /// `Ok(Some(path_str))` if config is provided and valid UTF-8,
    /// `Ok(None)` if no config provided,
    /// `Err(String)` if config path contains invalid UTF-8
    fn config_path_str(&self) -> Result<Option<&str>, String> {
        match &self.config {
            Some(path) => match path.to_str() {
                Some(path_str) => Ok(Some(path_str)),
                None => Err(format!(
                    "Configuration file path contains invalid UTF-8 characters: {}",
                    path.display()
                )),
            },
            None => Ok(None),
        }
    }
}

/// Pairing modes a subcommand can restrict the analyzer to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairingMode {
    StartStop,
    Chains,
}

/// UE size output of one log
#[derive(Debug, Serialize)]
struct UeSizeReport {
    label: String,
    /// Offered load in Mbit/s when read from the file name
    throughput: Option<f64>,
    series: Vec<UeSeries>,
}

/// Schedule output of one log
#[derive(Debug, Serialize)]
struct ScheduleReport {
    label: String,
    slots_per_frame: u32,
    summary: ScheduleSummary,
}

/// Runs one subcommand against a loaded configuration
struct SlotLens {
    config: Config,
    out_dir: PathBuf,
}

impl SlotLens {
    fn new(config: Config, out_dir: PathBuf) -> Self {
        Self { config, out_dir }
    }

    /// Load configuration from file or use defaults
    ///
    /// # Arguments
    ///
    /// * `config_path` - Optional path to configuration file
    ///
    /// # Returns
    ///
    /// Loaded configuration or default configuration if file not found or invalid
    fn load_config(config_path: Option<&str>) -> Result<Config, ConfigError> {
        match config_path {
            Some(path) => {
                info!("Loading configuration from: {}", path);
                match Config::from_file(Path::new(path)) {
                    Ok(config) => Ok(config),
                    Err(ConfigError::ReadError(_)) => {
                        warn!(
                            "Configuration file '{}' not found or unreadable, using defaults",
                            path
                        );
                        Ok(Config::default())
                    }
                    Err(e) => {
                        error!("Configuration error in '{}': {}", path, e);
                        warn!("Using default configuration due to invalid config file");
                        Ok(Config::default())
                    }
                }
            }
            None => {
                info!("Using default configuration");
                Ok(Config::default())
            }
        }
    }

    /// Configuration with pairing narrowed to one mode
    ///
    /// # Errors
    ///
    /// Fails if the configuration has no rules of that mode.
    fn restricted(&self, mode: PairingMode) -> anyhow::Result<Config> {
        let mut config = self.config.clone();
        let pairing = &self.config.pairing;
        config.pairing = match mode {
            PairingMode::StartStop => PairingSpec::start_stop_only(pairing.start_stop.clone()),
            PairingMode::Chains => PairingSpec::chains_only(pairing.chains.clone()),
        };
        if config.pairing.start_stop.is_empty() && config.pairing.chains.is_empty() {
            bail!("configuration has no {:?} pairing rules", mode);
        }
        Ok(config)
    }

    fn analyzer(&self, config: Config) -> anyhow::Result<Analyzer> {
        Analyzer::new(config).context("failed to build analyzer")
    }

    fn out_path(&self, name: &str) -> PathBuf {
        self.out_dir.join(name)
    }

    fn prepare_out_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("unable to create {}", self.out_dir.display()))
    }

    fn run(&self, command: &Command) -> anyhow::Result<()> {
        if !matches!(command, Command::Merge { .. }) {
            self.prepare_out_dir()?;
        }

        match command {
            Command::Pairs { logs } => self.intervals("pairs", PairingMode::StartStop, logs),
            Command::Chain { logs } => self.intervals("chain", PairingMode::Chains, logs),
            Command::Cadence { log } => self.cadence(log),
            Command::Delays { vnf, pnf } => self.delays(vnf, pnf),
            Command::UeSize {
                log,
                all_ues,
                throughput,
            } => self.ue_size(log, *all_ues, *throughput),
            Command::Merge {
                first,
                second,
                output,
            } => self.merge(first, second, output),
            Command::Schedule { log } => self.schedule(log),
        }
    }

    fn intervals(&self, name: &str, mode: PairingMode, logs: &[PathBuf]) -> anyhow::Result<()> {
        let analyzer = self.analyzer(self.restricted(mode)?)?;
        let report = analyzer.analyze_files(logs)?;
        let unit = analyzer.correlator().unit();

        for source in &report.sources {
            println!(
                "{}: {} intervals, {} anomalous",
                source.label,
                source.intervals.intervals.len(),
                source.intervals.anomalies
            );
            print_statistics(&source.intervals.statistics, unit.symbol());
            write_intervals_csv(
                &source.intervals.intervals,
                &self.out_path(&format!("{}-{}-intervals.csv", name, source.label)),
            )?;
        }

        if report.sources.len() > 1 {
            println!("combined:");
            print_statistics(&report.combined, unit.symbol());
        }

        self.write_report(name, &report)
    }

    fn cadence(&self, log: &Path) -> anyhow::Result<()> {
        let analyzer = self.analyzer(self.config.clone())?;
        let collected = analyzer.collect(log)?.require_events()?;
        let report = analyzer.cadence(&collected.events);

        println!(
            "{}: {} slot intervals, {} anomalous",
            collected.label,
            report.intervals.len(),
            report.anomalies
        );
        print_statistics(&report.statistics, self.config.units.cadence.symbol());

        write_intervals_csv(&report.intervals, &self.out_path("cadence-intervals.csv"))?;
        write_statistics_csv(&report.statistics, &self.out_path("cadence-statistics.csv"))?;
        write_json(&report, &self.out_path("cadence.json"))?;
        Ok(())
    }

    fn delays(&self, vnf: &Path, pnf: &Path) -> anyhow::Result<()> {
        let analyzer = self.analyzer(self.config.clone())?;
        let report = analyzer.analyze_files(&[vnf.to_path_buf(), pnf.to_path_buf()])?;

        for source in &report.sources {
            println!(
                "{}: {} records, {} anomalous",
                source.label,
                source.records.len(),
                source.anomalous_records()
            );
            for (tag, fields) in &source.record_statistics {
                println!("  {}", tag);
                print_statistics(fields, DurationUnit::Microseconds.symbol());
            }
            for (variant, timing) in &source.timing {
                println!(
                    "  {}: {} too late, {} too early",
                    variant, timing.too_late.count, timing.too_early.count
                );
            }
            write_events_csv(
                &source.records,
                &self.out_path(&format!("delays-{}-records.csv", source.label)),
            )?;
        }

        self.write_report("delays", &report)
    }

    fn ue_size(&self, log: &Path, all_ues: bool, throughput: bool) -> anyhow::Result<()> {
        let analyzer = self.analyzer(self.config.clone())?;
        let collected = analyzer.collect(log)?.require_events()?;
        let series = analyzer.ue_series(&collected.events);

        let throughput = if throughput {
            let value = throughput_from_file_name(log);
            if value.is_none() {
                warn!("No throughput in file name {}", log.display());
            }
            value
        } else {
            None
        };

        let selected: Vec<UeSeries> = if all_ues {
            series.into_values().collect()
        } else {
            busiest_ue(&series).cloned().into_iter().collect()
        };
        if selected.is_empty() {
            bail!("no UE size records in {}", log.display());
        }

        if let Some(mbps) = throughput {
            println!("{}: offered load {} Mbit/s", collected.label, mbps);
        }
        for ue in &selected {
            println!(
                "UE {}: {} samples over {:.3} s, {}",
                ue.label(),
                ue.samples.len(),
                ue.span(),
                format_statistics(&ue.statistics, "")
            );
        }

        let report = UeSizeReport {
            label: collected.label,
            throughput,
            series: selected,
        };
        write_json(&report, &self.out_path("ue-size.json"))?;
        Ok(())
    }

    fn merge(&self, first: &Path, second: &Path, output: &Path) -> anyhow::Result<()> {
        let lines = merge_logs_to_file(&[first, second], output)
            .with_context(|| format!("unable to merge into {}", output.display()))?;
        println!("{} lines written to {}", lines, output.display());
        Ok(())
    }

    fn schedule(&self, log: &Path) -> anyhow::Result<()> {
        let analyzer = self.analyzer(self.config.clone())?;
        let collected = analyzer.collect(log)?.require_events()?;
        let map = analyzer.schedule(&collected.events);
        if map.is_empty() {
            warn!("No checkpoint events in {}", log.display());
        }

        let summary = map.summary();
        println!(
            "{}: {} frames, {} uplink only, {} downlink only, {} both, {} idle",
            collected.label,
            summary.frames,
            summary.uplink_only,
            summary.downlink_only,
            summary.both,
            summary.idle
        );

        write_schedule_csv(&map.cells(), &self.out_path("schedule.csv"))?;
        let report = ScheduleReport {
            label: collected.label,
            slots_per_frame: self.config.schedule.slots_per_frame,
            summary,
        };
        write_json(&report, &self.out_path("schedule.json"))?;
        Ok(())
    }

    fn write_report(&self, name: &str, report: &AnalysisReport) -> anyhow::Result<()> {
        write_statistics_csv(&report.combined, &self.out_path(&format!("{}-statistics.csv", name)))?;
        let path = self.out_path(&format!("{}.json", name));
        write_json(report, &path)?;
        info!("Report written to {}", path.display());
        Ok(())
    }
}

fn format_statistics(stats: &SummaryStatistics, unit: &str) -> String {
    match (stats.mean, stats.median, stats.min, stats.max, stats.std_dev) {
        (Some(mean), Some(median), Some(min), Some(max), Some(std_dev)) => format!(
            "n={} mean={:.2}{u} median={:.2}{u} min={:.2}{u} max={:.2}{u} sd={:.2}",
            stats.count,
            mean,
            median,
            min,
            max,
            std_dev,
            u = unit
        ),
        _ => format!("n={}", stats.count),
    }
}

fn print_statistics(statistics: &BTreeMap<String, SummaryStatistics>, unit: &str) {
    for (group, stats) in statistics {
        println!("    {:<20} {}", group, format_statistics(stats, unit));
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config_path = match cli.config_path_str() {
        Ok(path) => path,
        Err(e) => {
            error!("Invalid configuration path: {}", e);
            std::process::exit(1);
        }
    };

    let config = match SlotLens::load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let app = SlotLens::new(config, cli.out_dir.clone());
    if let Err(e) = app.run(&cli.command) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
