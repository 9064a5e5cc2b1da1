//! # CLI Command Implementations
//!
//! Every workflow command loads the request document, applies one session
//! operation and writes the document back. A refused operation leaves the
//! file untouched.

use crate::api;
use crate::config::MocConfig;
use crate::progress::{TracingSink, describe};
use moc_core::primitives::MAX_DOCUMENT_SIZE;
use moc_core::{
    ApprovalStatus, AttachmentRef, MocError, Request, RequestId, RequestIntake, RiskAssessment,
    SideAction, TaskPayload, TaskSlot, WorkflowEngine, WorkflowEvent, WorkflowSession,
    assess_risk, document_from_bytes, document_to_bytes, risk_matrix,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE HANDLING
// =============================================================================

/// Maximum size of an intake file (64 KB).
const MAX_INTAKE_FILE_SIZE: u64 = 64 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), MocError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| MocError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(MocError::DeserializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and ensure it is a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, MocError> {
    let canonical = path.canonicalize().map_err(|e| {
        MocError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(MocError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path.
fn validate_output_path(path: &Path) -> Result<PathBuf, MocError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        MocError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(MocError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| MocError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read and decode a request document.
pub fn load_document(path: &Path) -> Result<Request, MocError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_DOCUMENT_SIZE as u64)?;

    let bytes = std::fs::read(&path)
        .map_err(|e| MocError::IoError(format!("Failed to read document: {}", e)))?;
    document_from_bytes(&bytes)
}

/// Encode and write a request document.
///
/// Written to a sibling temp file first, then renamed over the target.
pub fn save_document(path: &Path, request: &Request) -> Result<(), MocError> {
    let path = validate_output_path(path)?;
    let bytes = document_to_bytes(request)?;

    let mut temp = path.clone().into_os_string();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    std::fs::write(&temp, &bytes)
        .map_err(|e| MocError::IoError(format!("Failed to write document: {}", e)))?;
    if let Err(e) = std::fs::rename(&temp, &path) {
        if let Err(cleanup) = std::fs::remove_file(&temp) {
            tracing::warn!("Failed to remove {}: {}", temp.display(), cleanup);
        }
        return Err(MocError::IoError(format!(
            "Failed to replace document: {}",
            e
        )));
    }

    tracing::debug!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

/// Read an intake TOML file.
pub fn load_intake(path: &Path) -> Result<RequestIntake, MocError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_INTAKE_FILE_SIZE)?;

    let text = std::fs::read_to_string(&path)
        .map_err(|e| MocError::IoError(format!("Failed to read intake: {}", e)))?;
    toml::from_str(&text).map_err(|e| MocError::InvalidIntake(format!("{}", e)))
}

/// Parse `CATEGORY=FILE`.
pub fn parse_attachment(raw: &str) -> Result<AttachmentRef, MocError> {
    let (category, file_name) = raw.split_once('=').ok_or_else(|| {
        MocError::ValidationFailed(format!(
            "attachment '{}' must be CATEGORY=FILE",
            raw
        ))
    })?;
    let attachment = AttachmentRef::new(category.trim(), file_name.trim());
    attachment.validate()?;
    Ok(attachment)
}

// =============================================================================
// SESSION PLUMBING
// =============================================================================

/// Load the document into a session wired to the config's directory.
fn open_session(document: &Path, config: &MocConfig) -> Result<WorkflowSession, MocError> {
    let request = load_document(document)?;
    let mut session = WorkflowSession::new(
        request,
        Arc::new(WorkflowEngine::default()),
        Arc::new(config.directory()),
    );
    session.add_sink(Arc::new(TracingSink));
    Ok(session)
}

/// Run one operation and persist the result if it succeeded.
fn run_operation(
    document: &Path,
    config: &MocConfig,
    json_mode: bool,
    operation: impl FnOnce(&mut WorkflowSession) -> Result<Vec<WorkflowEvent>, MocError>,
) -> Result<(), MocError> {
    let mut session = open_session(document, config)?;
    let events = operation(&mut session)?;
    save_document(document, session.request())?;
    print_events(session.request(), &events, json_mode);
    Ok(())
}

fn print_events(request: &Request, events: &[WorkflowEvent], json_mode: bool) {
    if json_mode {
        let output = serde_json::json!({
            "request": request.id(),
            "status": request.status(),
            "active": request.active_slot(),
            "events": events,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return;
    }

    for event in events {
        let marker = if event.is_warning() { "!" } else { "-" };
        println!("{} {}", marker, describe(event));
    }
    match request.active_slot() {
        Some(slot) => println!("Next: {}", slot),
        None => println!("Request is {}", request.status()),
    }
}

fn format_risk(assessment: &RiskAssessment) -> String {
    format!("{} ({})", assessment.risk_code(), assessment.band())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(
    mut config: MocConfig,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), MocError> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    println!("MOC Tracker Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:     {}", config.server.addr());
    println!("  People:      {}", config.people.len());
    println!("  Disciplines: {}", config.disciplines.len());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&config).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Open a request from an intake file and write its document.
pub fn cmd_init(
    document: &Path,
    config: &MocConfig,
    json_mode: bool,
    id: &str,
    intake: &Path,
    force: bool,
) -> Result<(), MocError> {
    if document.exists() && !force {
        return Err(MocError::IoError(format!(
            "Document '{}' already exists (use --force to overwrite)",
            document.display()
        )));
    }
    if config.catalog().is_empty() {
        tracing::warn!("Discipline catalog is empty; the review team cannot be assigned");
    }

    let intake = load_intake(intake)?;
    let request = Request::open(RequestId::new(id), intake, config.catalog())?;
    save_document(document, &request)?;

    if json_mode {
        let output = serde_json::json!({
            "request": request.id(),
            "document": document.to_string_lossy(),
            "risk_before": request.risk_before().risk_code(),
            "risk_after": request.risk_after().risk_code(),
            "active": request.active_slot(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Opened {}: {}", request.id(), request.title());
    println!("  Risk before: {}", format_risk(request.risk_before()));
    println!("  Risk after:  {}", format_risk(request.risk_after()));
    println!("  Document:    {}", document.display());

    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show the request, its stages and tasks.
pub fn cmd_status(document: &Path, json_mode: bool) -> Result<(), MocError> {
    let request = load_document(document)?;

    if json_mode {
        let output = serde_json::json!({
            "request": request,
            "progress": request.progress(),
            "active": request.active_slot(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("{}: {}", request.id(), request.title());
    println!("{}", "=".repeat(request.id().as_str().len() + request.title().len() + 2));
    println!("Status:      {}", request.status());
    println!("Risk before: {}", format_risk(request.risk_before()));
    println!("Risk after:  {}", format_risk(request.risk_after()));
    if let Some(champion) = request.champion() {
        println!("Champion:    {}", champion);
    }
    println!();

    for (stage, progress) in request.stages().iter().zip(request.progress()) {
        println!(
            "{} [{}] {}/{} ({}%)",
            stage.kind, progress.status, progress.completed, progress.total, progress.percent
        );
        for task in &stage.tasks {
            let marker = if progress.active == Some(task.index) {
                ">"
            } else {
                " "
            };
            println!(
                "  {} {}. {:<34} {:<12} {}",
                marker,
                task.index,
                task.name,
                task.status.name(),
                task.assignee.role
            );
            if let Some(remark) = &task.rejection_remark {
                println!("       rejected: {}", remark);
            }
        }
    }

    if !request.history().is_empty() {
        println!();
        println!("History:");
        for action in request.history() {
            println!("  - {}", action.name());
        }
    }

    Ok(())
}

// =============================================================================
// TASK COMMANDS
// =============================================================================

/// Complete the in-progress task.
pub fn cmd_complete(
    document: &Path,
    config: &MocConfig,
    json_mode: bool,
    slot: TaskSlot,
    payload: Option<&str>,
) -> Result<(), MocError> {
    let payload = payload
        .map(|text| {
            serde_json::from_str::<TaskPayload>(text)
                .map_err(|e| MocError::DeserializationError(format!("Invalid payload: {}", e)))
        })
        .transpose()?;

    run_operation(document, config, json_mode, |session| {
        let payload = match payload {
            Some(payload) => payload,
            None => session
                .request()
                .task(slot)
                .map(|task| task.payload.clone())
                .ok_or(MocError::TaskNotFound(slot))?,
        };
        session.complete_task(slot, payload)
    })
}

/// Reject the in-progress task.
pub fn cmd_reject(
    document: &Path,
    config: &MocConfig,
    json_mode: bool,
    slot: TaskSlot,
    remark: &str,
) -> Result<(), MocError> {
    run_operation(document, config, json_mode, |session| {
        session.reject_task(slot, remark)
    })
}

/// Reopen a rejected task.
pub fn cmd_reopen(
    document: &Path,
    config: &MocConfig,
    json_mode: bool,
    slot: TaskSlot,
) -> Result<(), MocError> {
    run_operation(document, config, json_mode, |session| {
        session.reopen_task(slot)
    })
}

/// Add a comment and attachments to the active task.
pub fn cmd_annotate(
    document: &Path,
    config: &MocConfig,
    json_mode: bool,
    slot: TaskSlot,
    comment: &str,
    attachments: &[String],
) -> Result<(), MocError> {
    let attachments = attachments
        .iter()
        .map(|raw| parse_attachment(raw))
        .collect::<Result<Vec<_>, _>>()?;

    run_operation(document, config, json_mode, |session| {
        session.annotate_task(slot, comment, &attachments)
    })
}

/// Record an approval row decision.
pub fn cmd_approve(
    document: &Path,
    config: &MocConfig,
    json_mode: bool,
    row: &str,
    status: Option<ApprovalStatus>,
    remark: &str,
) -> Result<(), MocError> {
    run_operation(document, config, json_mode, |session| {
        session.update_approval_row(row, status, remark)
    })
}

/// Apply a side action.
pub fn cmd_action(
    document: &Path,
    config: &MocConfig,
    json_mode: bool,
    action: SideAction,
) -> Result<(), MocError> {
    run_operation(document, config, json_mode, |session| {
        session.apply_side_action(&action)
    })
}

// =============================================================================
// RISK COMMAND
// =============================================================================

/// Assess one pair, or print the whole matrix.
pub fn cmd_risk(
    json_mode: bool,
    severity: Option<u8>,
    probability: Option<u8>,
    matrix: bool,
) -> Result<(), MocError> {
    if matrix {
        let rows = risk_matrix();
        if json_mode {
            let output: Vec<Vec<serde_json::Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|cell| {
                            serde_json::json!({
                                "risk_code": cell.risk_code(),
                                "band": cell.band().name(),
                            })
                        })
                        .collect()
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string_pretty(&output).unwrap_or_default()
            );
            return Ok(());
        }

        for row in &rows {
            let line: Vec<String> = row
                .iter()
                .map(|cell| format!("{:<14}", format_risk(cell)))
                .collect();
            println!("{}", line.join(" "));
        }
        return Ok(());
    }

    let (Some(severity), Some(probability)) = (severity, probability) else {
        return Err(MocError::ValidationFailed(
            "--severity and --probability are required unless --matrix is given".to_string(),
        ));
    };
    let assessment = assess_risk(severity, probability)?;

    if json_mode {
        let output = serde_json::json!({
            "severity": assessment.severity(),
            "probability": assessment.probability(),
            "risk_code": assessment.risk_code(),
            "band": assessment.band().name(),
            "product": assessment.product(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Risk: {}", format_risk(&assessment));
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
