//! # CLI Commands
//!
//! Implementation of all CLI commands.
//!
//! Patient commands run one [`Session`] transition per invocation. There is
//! no scheduler in a one-shot process, so every patient command first
//! applies a pending automatic resolution that has come due since the last
//! invocation.

use crate::api::{
    self, ClassifyResponse, DetectResponse, FlowResponse, IntakeRequest, PatientListResponse,
    PatientSummary, ProtocolResponse, StepView,
};
use crate::config::Config;
use crate::service::{TriageService, now_ms, today};
use chrono::NaiveDate;
use std::path::Path;
use std::sync::Arc;
use triage_core::{
    ClassifierContext, ClinicalObservation, FlowRepository, FlowUpdate, GlucoseReading, Measure,
    MemoryRepository, Metric, MetricReading, PatientId, Protocol, RedbRepository, Session, Sex,
    StepId, TriageError, classify_input, detect,
};

use super::Commands;

/// Maximum size of a protocol file (1 MiB).
const MAX_PROTOCOL_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SETUP
// =============================================================================

/// Load the protocol: a TOML file if given, the built-in dengue protocol otherwise.
pub fn load_protocol(path: Option<&Path>) -> Result<Protocol, TriageError> {
    let Some(path) = path else {
        return Protocol::dengue();
    };
    let metadata = std::fs::metadata(path)
        .map_err(|e| TriageError::IoError(format!("{}: {}", path.display(), e)))?;
    if metadata.len() > MAX_PROTOCOL_FILE_SIZE {
        return Err(TriageError::InvalidProtocol(format!(
            "file too large: {} bytes (max {} bytes)",
            metadata.len(),
            MAX_PROTOCOL_FILE_SIZE
        )));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| TriageError::IoError(format!("{}: {}", path.display(), e)))?;
    let protocol = Protocol::from_toml_str(&text)?;
    tracing::info!(
        path = %path.display(),
        name = %protocol.name,
        steps = protocol.graph.len(),
        "Loaded protocol"
    );
    Ok(protocol)
}

/// Open the flow repository for `backend`.
pub fn open_repository(db_path: &Path, backend: &str) -> Result<Arc<dyn FlowRepository>, TriageError> {
    match backend {
        "redb" => Ok(Arc::new(RedbRepository::open(db_path)?)),
        "memory" => {
            tracing::warn!("Memory backend: flows are discarded when the process exits");
            Ok(Arc::new(MemoryRepository::new()))
        }
        other => Err(TriageError::InvalidInput(format!(
            "unknown backend '{}' (expected redb or memory)",
            other
        ))),
    }
}

/// What every patient command needs.
pub struct CommandContext<'a> {
    session: Session<'a>,
    protocol: &'a Protocol,
    json_mode: bool,
}

impl<'a> CommandContext<'a> {
    #[must_use]
    pub fn new(
        protocol: &'a Protocol,
        repository: &'a dyn FlowRepository,
        config: &Config,
        json_mode: bool,
    ) -> Self {
        Self {
            session: Session::new(protocol, repository, config.engine.auto_delay_ms),
            protocol,
            json_mode,
        }
    }

    /// Apply the patient's pending resolution if it is due.
    fn catch_up(&self, id: &PatientId) -> Result<Option<FlowUpdate>, TriageError> {
        let flow = self.session.load(id)?;
        match flow.pending {
            Some(pending) => self.session.tick(id, pending.revision, now_ms()),
            None => Ok(None),
        }
    }

    fn report(&self, update: FlowUpdate) {
        let response = FlowResponse::from_update(update, self.protocol);
        if self.json_mode {
            print_json(&response);
        } else {
            print_flow(&response);
        }
    }
}

/// Dispatch a command that works on stored patient flows.
pub fn run_patient_command(ctx: &CommandContext<'_>, command: Commands) -> Result<(), TriageError> {
    match command {
        Commands::Intake {
            id,
            age,
            weight,
            gender,
            birth_date,
            allergies,
        } => {
            let request = IntakeRequest {
                id,
                age,
                weight: weight.as_deref().map(parse_measure).transpose()?,
                gender,
                birth_date: birth_date.as_deref().map(parse_date).transpose()?,
                allergies,
            };
            cmd_intake(ctx, request)
        }
        Commands::Show { id } => cmd_show(ctx, &PatientId::new(id)),
        Commands::List => cmd_list(ctx),
        Commands::Advance { id, option } => cmd_advance(ctx, &PatientId::new(id), option),
        Commands::Back { id } => cmd_back(ctx, &PatientId::new(id)),
        Commands::Restart { id } => cmd_restart(ctx, &PatientId::new(id)),
        Commands::Observe { id, values } => cmd_observe(ctx, &PatientId::new(id), &values),
        Commands::Resolve { id } => cmd_resolve(ctx, &PatientId::new(id)),
        other => Err(TriageError::InvalidInput(format!(
            "not a patient command: {:?}",
            other
        ))),
    }
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    db_path: &Path,
    backend: &str,
    protocol: Protocol,
    config: &Config,
) -> Result<(), TriageError> {
    let repository = open_repository(db_path, backend)?;
    let service = TriageService::new(protocol, repository, config.engine.auto_delay_ms);
    let addr = format!("{}:{}", config.server.host, config.server.port);

    tracing::info!(
        addr = %addr,
        backend,
        auto_delay_ms = config.engine.auto_delay_ms,
        "Starting triage server"
    );
    api::run_server(&addr, service, &config.security).await
}

// =============================================================================
// PATIENT COMMANDS
// =============================================================================

/// Admit a patient.
pub fn cmd_intake(ctx: &CommandContext<'_>, request: IntakeRequest) -> Result<(), TriageError> {
    let record = request.into_record()?;
    let update = ctx.session.admit(record, today())?;
    ctx.report(update);
    Ok(())
}

/// Show a patient's flow.
pub fn cmd_show(ctx: &CommandContext<'_>, id: &PatientId) -> Result<(), TriageError> {
    let update = match ctx.catch_up(id)? {
        Some(update) => update,
        None => FlowUpdate {
            flow: ctx.session.load(id)?,
            completed: false,
            escalation: None,
            resolution: None,
        },
    };
    ctx.report(update);
    Ok(())
}

/// List admitted patients.
pub fn cmd_list(ctx: &CommandContext<'_>) -> Result<(), TriageError> {
    let patients: Vec<PatientSummary> = ctx
        .session
        .list()?
        .iter()
        .map(|flow| PatientSummary::new(flow, ctx.protocol))
        .collect();

    if ctx.json_mode {
        print_json(&PatientListResponse {
            count: patients.len(),
            patients,
        });
        return Ok(());
    }

    if patients.is_empty() {
        println!("No patients admitted.");
        return Ok(());
    }
    println!("{:<20} {:<8} {:>8}  Step", "Patient", "Group", "Progress");
    for p in &patients {
        let group = p.group.map(|g| g.letter()).unwrap_or("-");
        let mut step = p.title.clone();
        if p.pending {
            step.push_str(" (auto pending)");
        }
        println!("{:<20} {:<8} {:>7}%  {}", p.id, group, p.progress, step);
    }
    Ok(())
}

/// Choose option `option` on the current step.
pub fn cmd_advance(ctx: &CommandContext<'_>, id: &PatientId, option: usize) -> Result<(), TriageError> {
    ctx.catch_up(id)?;
    let update = ctx.session.advance(id, option, now_ms())?;
    ctx.report(update);
    Ok(())
}

/// Go back one step.
pub fn cmd_back(ctx: &CommandContext<'_>, id: &PatientId) -> Result<(), TriageError> {
    ctx.catch_up(id)?;
    let update = ctx.session.go_back(id)?;
    ctx.report(update);
    Ok(())
}

/// Restart the protocol.
pub fn cmd_restart(ctx: &CommandContext<'_>, id: &PatientId) -> Result<(), TriageError> {
    let update = ctx.session.restart(id)?;
    ctx.report(update);
    Ok(())
}

/// Record measurements given as `key=value`.
pub fn cmd_observe(ctx: &CommandContext<'_>, id: &PatientId, values: &[String]) -> Result<(), TriageError> {
    let observation = parse_measurements(values)?;
    ctx.catch_up(id)?;
    let update = ctx.session.observe(id, &observation, now_ms())?;
    ctx.report(update);
    Ok(())
}

/// Resolve the current automatic step now.
pub fn cmd_resolve(ctx: &CommandContext<'_>, id: &PatientId) -> Result<(), TriageError> {
    let update = ctx.session.resolve(id, now_ms())?;
    ctx.report(update);
    Ok(())
}

// =============================================================================
// STATELESS COMMANDS
// =============================================================================

/// Classify one raw value.
pub fn cmd_classify(
    json_mode: bool,
    metric: &str,
    value: &str,
    age_months: Option<u32>,
    sex: Option<&str>,
    weight: Option<&str>,
) -> Result<(), TriageError> {
    let metric: Metric = metric.parse()?;
    let context = ClassifierContext {
        age_months,
        sex: sex.map(Sex::parse).unwrap_or_default(),
        weight: weight.map(parse_measure).transpose()?,
    };
    let reading = MetricReading {
        metric,
        classification: classify_input(metric, value, &context),
    };

    if json_mode {
        print_json(&ClassifyResponse {
            readings: vec![reading],
        });
        return Ok(());
    }
    print_reading(&reading);
    Ok(())
}

/// Run the escalation detector over measurements given as `key=value`.
pub fn cmd_detect(json_mode: bool, values: &[String]) -> Result<(), TriageError> {
    let observation = parse_measurements(values)?;
    let escalation = detect(&observation);

    if json_mode {
        print_json(&DetectResponse { escalation });
        return Ok(());
    }
    match escalation {
        Some(found) => println!(
            "ESCALATION ({:?}): {} -> {} [{}]",
            found.tier, found.trigger, found.suggested_group, found.finding
        ),
        None => println!("No escalation findings."),
    }
    Ok(())
}

/// Print the protocol, or one step of it.
pub fn cmd_protocol(protocol: &Protocol, json_mode: bool, step: Option<&str>) -> Result<(), TriageError> {
    if let Some(step) = step {
        let view = StepView::new(protocol.graph.lookup(&StepId::new(step))?, protocol);
        if json_mode {
            print_json(&view);
        } else {
            print_step(&view);
        }
        return Ok(());
    }

    let response = ProtocolResponse::new(protocol);
    if json_mode {
        print_json(&response);
        return Ok(());
    }
    println!("Protocol: {} ({} steps, valid)", response.name, response.steps.len());
    println!("Start:    {}", response.start);
    for view in &response.steps {
        println!();
        print_step(view);
    }
    Ok(())
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_measure(text: &str) -> Result<Measure, TriageError> {
    text.parse()
        .map_err(|e| TriageError::InvalidInput(format!("'{}': {}", text, e)))
}

fn parse_date(text: &str) -> Result<NaiveDate, TriageError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|e| TriageError::InvalidInput(format!("date '{}': {}", text, e)))
}

/// Build an observation from `key=value` arguments.
///
/// Keys are case-insensitive and ignore `-`/`_`: `hr`, `heart-rate`,
/// `bp=120/80`, `glucose=HI`, `ht`, `hb`, `plt` ...
pub fn parse_measurements(values: &[String]) -> Result<ClinicalObservation, TriageError> {
    let mut obs = ClinicalObservation::new();
    for pair in values {
        let (key, value) = pair.split_once('=').ok_or_else(|| {
            TriageError::InvalidInput(format!("expected key=value, got '{}'", pair))
        })?;
        let key: String = key
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        let slot = match key.as_str() {
            "bp" | "bloodpressure" => {
                if !obs.set_blood_pressure(value) {
                    return Err(TriageError::InvalidInput(format!(
                        "blood pressure '{}' is not sys/dia",
                        value
                    )));
                }
                continue;
            }
            "glucose" => {
                obs.glucose = Some(GlucoseReading::parse(value).ok_or_else(|| {
                    TriageError::InvalidInput(format!("glucose '{}' is not a reading", value))
                })?);
                continue;
            }
            "temp" | "temperature" => &mut obs.temperature,
            "hr" | "heartrate" => &mut obs.heart_rate,
            "rr" | "respiratoryrate" => &mut obs.respiratory_rate,
            "spo2" | "sat" => &mut obs.spo2,
            "hb" | "hemoglobin" => &mut obs.hemoglobin,
            "ht" | "hct" | "hematocrit" => &mut obs.hematocrit,
            "plt" | "platelets" => &mut obs.platelets,
            "albumin" => &mut obs.albumin,
            "alt" => &mut obs.alt,
            "ast" => &mut obs.ast,
            "diuresis" => &mut obs.diuresis_ml_per_hour,
            _ => {
                return Err(TriageError::InvalidInput(format!(
                    "unknown measurement '{}'",
                    key
                )));
            }
        };
        *slot = Some(parse_measure(value)?);
    }
    Ok(obs)
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_json<T: serde::Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

fn print_step(view: &StepView) {
    println!("{} ({:?})", view.title, view.kind);
    println!("  id: {}", view.id);
    if !view.description.is_empty() {
        println!("  {}", view.description);
    }
    if let Some(group) = view.group {
        println!("  {}", group);
    }
    if view.automatic {
        let when = if view.requires_labs {
            " once labs are recorded"
        } else {
            ""
        };
        println!("  resolves automatically{}", when);
    }
    for option in &view.options {
        println!("  [{}] {} -> {}", option.index, option.text, option.next);
    }
}

fn print_reading(reading: &MetricReading) {
    let c = &reading.classification;
    if c.is_empty() {
        println!("  {:<16} (not classified)", reading.metric.name());
        return;
    }
    let derived = c.derived.map(|d| format!(" [{}]", d)).unwrap_or_default();
    println!("  {:<16} {}{} ({:?})", reading.metric.name(), c.label, derived, c.tone);
}

fn print_flow(response: &FlowResponse) {
    let state = &response.state;
    println!("Patient:  {}", response.patient.id);
    match &response.step {
        Some(step) => {
            println!("Progress: {}%", state.progress);
            println!(
                "Group:    {}",
                state.group.map(|g| g.to_string()).unwrap_or_else(|| "-".to_string())
            );
            println!();
            print_step(step);
        }
        None => println!("Step:     {} (unknown)", state.current_step),
    }

    if let Some(resolution) = &response.resolution {
        println!();
        println!("Resolved {} -> {}: {}", resolution.step, resolution.next, resolution.reason);
    }
    if let Some(pending) = &response.pending {
        let due_in = pending.due_at_ms.saturating_sub(now_ms());
        println!();
        println!(
            "Pending:  {} -> {} in {} ms (`triage resolve {}` applies it now)",
            pending.resolution.step, pending.resolution.next, due_in, response.patient.id
        );
    }
    if let Some(found) = &response.escalation {
        println!();
        println!(
            "ESCALATION ({:?}): {} -> {}",
            found.tier, found.trigger, found.suggested_group
        );
    }
    if response.completed {
        println!();
        println!("Protocol complete.");
    }
    if !response.readings.is_empty() {
        println!();
        println!("Readings:");
        for reading in &response.readings {
            print_reading(reading);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
