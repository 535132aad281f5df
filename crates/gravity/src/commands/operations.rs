//! Operation command handlers: listing, details, progress and logs.

use std::io::Write;

use futures_util::StreamExt;
use tabled::Tabled;

use gravity_core::operator::Operations;
use gravity_core::{
    Operator, OperationType, OperationsFilter, ProgressEntry, ProgressState, SiteOperation,
};

use crate::cli::{GlobalOpts, OperationKind, OperationsArgs, OperationsCommand, OperationsFilterArgs};
use crate::config::Target;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Filter translation ──────────────────────────────────────────────

impl From<OperationKind> for OperationType {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Install => Self::Install,
            OperationKind::Expand => Self::Expand,
            OperationKind::Shrink => Self::Shrink,
            OperationKind::Update => Self::Update,
            OperationKind::Uninstall => Self::Uninstall,
            OperationKind::Gc => Self::GarbageCollect,
            OperationKind::UpdateEnv => Self::UpdateEnviron,
            OperationKind::UpdateConfig => Self::UpdateConfig,
            OperationKind::Reconfigure => Self::Reconfigure,
        }
    }
}

impl From<OperationsFilterArgs> for OperationsFilter {
    fn from(args: OperationsFilterArgs) -> Self {
        Self {
            types: args.types.into_iter().map(OperationType::from).collect(),
            active: args.active,
            complete: args.complete,
            finished: args.finished,
            first: args.first,
            last: args.last,
        }
    }
}

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Updated")]
    updated: String,
}

impl OperationRow {
    fn new(op: &SiteOperation, color: bool) -> Self {
        Self {
            id: op.id.clone(),
            kind: op.operation_type().to_string(),
            state: output::paint_state(&op.state.to_string(), color),
            created: util::format_time(&op.created),
            updated: util::format_time(&op.updated),
        }
    }
}

fn operation_detail(op: &SiteOperation) -> String {
    let mut fields = vec![
        ("ID", op.id.clone()),
        ("Cluster", op.site_domain.clone()),
        ("Account", op.account_id.clone()),
        ("Type", op.operation_type().to_string()),
        ("State", op.state.to_string()),
        ("Provisioner", op.provisioner.clone()),
        ("Created", util::format_time(&op.created)),
        ("Updated", util::format_time(&op.updated)),
    ];
    if !op.created_by.is_empty() {
        fields.push(("Created by", op.created_by.clone()));
    }
    for server in &op.servers {
        fields.push((
            "Server",
            format!("{} ({}, {})", server.hostname, server.advertise_ip, server.role),
        ));
    }
    output::render_fields(&fields)
}

fn progress_line(entry: &ProgressEntry) -> String {
    let marker = match entry.state {
        ProgressState::InProgress => "…",
        ProgressState::Completed => "✓",
        ProgressState::Failed => "✗",
    };
    format!(
        "{marker} [{:>3}%] step {}: {}",
        entry.completion, entry.step, entry.message
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    operator: &dyn Operator,
    target: &Target,
    args: OperationsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        OperationsCommand::List(filter_args) => {
            let key = util::resolve_site_key(operator, target).await?;
            let filter = OperationsFilter::from(filter_args);
            tracing::debug!(cluster = %key, ?filter, "listing operations");

            let ops = operator.get_site_operations(&key, &filter).await?;
            let color = output::should_color(&global.color);
            let out = output::render_list(
                &global.output,
                &ops,
                |op| OperationRow::new(op, color),
                |op| op.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OperationsCommand::Show { id } => {
            let key = util::resolve_operation_key(operator, target, &id).await?;
            let op = operator.get_site_operation(&key).await?;
            let out =
                output::render_single(&global.output, &op, operation_detail, |op| op.id.clone());
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OperationsCommand::Progress {
            id,
            watch,
            interval,
        } => {
            let key = util::resolve_operation_key(operator, target, &id).await?;
            let mut last_seen: Option<ProgressEntry> = None;
            loop {
                let entry = operator.get_site_operation_progress(&key).await?;
                // Repeat polls only print when something moved.
                if last_seen.as_ref() != Some(&entry) {
                    let out =
                        output::render_single(&global.output, &entry, progress_line, |e| {
                            e.state.to_string()
                        });
                    output::print_output(&out, global.quiet);
                }
                if !watch || entry.is_completed() {
                    return finish_progress(&entry, &key.operation_id);
                }
                last_seen = Some(entry);
                tokio::time::sleep(interval).await;
            }
        }

        OperationsCommand::Logs { id } => {
            let key = util::resolve_operation_key(operator, target, &id).await?;
            let mut logs = operator.get_site_operation_logs(&key).await?;
            let mut stdout = std::io::stdout().lock();
            while let Some(line) = logs.next().await {
                let line = line?;
                writeln!(stdout, "{}", line.trim_end_matches('\n'))?;
            }
            Ok(())
        }
    }
}

/// A watched operation that ended in failure fails the command.
fn finish_progress(entry: &ProgressEntry, operation_id: &str) -> Result<(), CliError> {
    if entry.state == ProgressState::Failed {
        return Err(CliError::ApiError {
            kind: "operation_failed".into(),
            message: format!("operation {operation_id} failed: {}", entry.message),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_flags_map_onto_filter() {
        let filter = OperationsFilter::from(OperationsFilterArgs {
            types: vec![OperationKind::Install, OperationKind::Gc],
            active: false,
            complete: true,
            finished: false,
            first: false,
            last: true,
        });
        assert_eq!(
            filter.types,
            vec![OperationType::Install, OperationType::GarbageCollect]
        );
        assert!(filter.complete);
        assert!(filter.last);
        assert!(!filter.active);
    }

    #[test]
    fn test_empty_flags_give_empty_filter() {
        let filter = OperationsFilter::from(OperationsFilterArgs {
            types: Vec::new(),
            active: false,
            complete: false,
            finished: false,
            first: false,
            last: false,
        });
        assert!(filter.is_empty());
    }
}
