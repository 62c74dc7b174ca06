//! # Triage CLI Module
//!
//! This module implements the CLI interface for the triage engine.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `intake` - Admit a patient
//! - `show` - Show a patient's flow
//! - `list` - List patients
//! - `advance` - Choose an option on the current step
//! - `back` - Go back one step
//! - `restart` - Restart the protocol
//! - `observe` - Record measurements (`hr=120 bp=90/60 ...`)
//! - `resolve` - Resolve the current automatic step now
//! - `classify` - Classify one raw value
//! - `detect` - Run the escalation detector
//! - `protocol` - Print or validate a protocol

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use triage_core::TriageError;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Dengue triage protocol engine
///
/// Walks patients through the dengue severity flowchart (groups A-D),
/// classifies vital signs and lab values, and flags findings that require
/// escalation.
#[derive(Parser, Debug)]
#[command(name = "triage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the flow database
    #[arg(short = 'D', long, global = true, default_value = "triage.redb")]
    pub database: PathBuf,

    /// Storage backend: "redb" (ACID database) or "memory" (discarded on exit)
    #[arg(short = 'B', long, global = true, default_value = "redb")]
    pub backend: String,

    /// Protocol definition (TOML); the built-in dengue protocol if omitted
    #[arg(short = 'P', long, global = true)]
    pub protocol: Option<PathBuf>,

    /// Configuration file; `triage.toml` is read if present
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Delay before automatic steps resolve, in milliseconds
        #[arg(long)]
        auto_delay_ms: Option<u64>,
    },

    /// Admit a patient at the start of the protocol
    Intake {
        /// Patient identifier
        id: String,

        /// Age in whole years
        #[arg(long)]
        age: Option<u32>,

        /// Weight in kg
        #[arg(long)]
        weight: Option<String>,

        /// Sex (M/F)
        #[arg(long)]
        gender: Option<String>,

        /// Birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<String>,

        /// Allergy (repeatable)
        #[arg(long = "allergy")]
        allergies: Vec<String>,
    },

    /// Show a patient's flow
    Show {
        /// Patient identifier
        id: String,
    },

    /// List admitted patients
    List,

    /// Choose an option on the current step
    Advance {
        /// Patient identifier
        id: String,

        /// Option index, as printed by `show`
        option: usize,
    },

    /// Go back one step
    Back {
        /// Patient identifier
        id: String,
    },

    /// Restart the protocol for a patient
    Restart {
        /// Patient identifier
        id: String,
    },

    /// Record measurements, e.g. `hr=120 bp=90/60 glucose=HI`
    Observe {
        /// Patient identifier
        id: String,

        /// Measurements as key=value
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Resolve the current automatic step now
    Resolve {
        /// Patient identifier
        id: String,
    },

    /// Classify one raw value
    Classify {
        /// Metric (hr, rr, temp, spo2, bp, glucose, hemoglobin, ratio, ...)
        metric: String,

        /// Raw value, e.g. `120`, `90/60`, `HI`
        value: String,

        /// Age in months (hemoglobin ranges)
        #[arg(long)]
        age_months: Option<u32>,

        /// Sex (M/F)
        #[arg(long)]
        sex: Option<String>,

        /// Weight in kg (diuresis)
        #[arg(long)]
        weight: Option<String>,
    },

    /// Run the escalation detector over measurements
    Detect {
        /// Measurements as key=value
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// Print the loaded protocol, or one step of it
    Protocol {
        /// Step to print
        #[arg(short, long)]
        step: Option<String>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), TriageError> {
    let mut config = Config::load(cli.config.as_deref())?;
    let protocol = load_protocol(cli.protocol.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server {
            host,
            port,
            auto_delay_ms,
        }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(delay) = auto_delay_ms {
                config.set_auto_delay_ms(delay);
            }
            cmd_server(&cli.database, &cli.backend, protocol, &config).await
        }
        Some(Commands::Classify {
            metric,
            value,
            age_months,
            sex,
            weight,
        }) => cmd_classify(
            json_mode,
            &metric,
            &value,
            age_months,
            sex.as_deref(),
            weight.as_deref(),
        ),
        Some(Commands::Detect { values }) => cmd_detect(json_mode, &values),
        Some(Commands::Protocol { step }) => cmd_protocol(&protocol, json_mode, step.as_deref()),
        Some(command) => {
            let repository = open_repository(&cli.database, &cli.backend)?;
            let ctx = CommandContext::new(&protocol, repository.as_ref(), &config, json_mode);
            run_patient_command(&ctx, command)
        }
        None => {
            // No subcommand - print the protocol by default
            cmd_protocol(&protocol, json_mode, None)
        }
    }
}
