//! Translate command implementation.

use serde::Serialize;
use twinsync_engine::translator::{AttributeTranslator, ExpectedState, MirrorPlan};
use twinsync_engine::{SyncMode, ToleranceTable};
use twinsync_model::{ActionRequest, EntityState};

/// A mirror plan as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct TranslateResult {
    /// Actions in invocation order.
    pub actions: Vec<ActionRequest>,
    /// State the target should report afterwards.
    pub expected: ExpectedState,
    /// Fields dropped during conversion.
    pub dropped: Vec<String>,
    /// Whether the target already matches.
    pub in_sync: bool,
}

impl TranslateResult {
    fn new(plan: MirrorPlan, in_sync: bool) -> Self {
        Self {
            actions: plan.actions,
            expected: plan.expected,
            dropped: plan.dropped.iter().map(ToString::to_string).collect(),
            in_sync,
        }
    }
}

/// Runs the translate command.
pub fn run(
    source: &str,
    target: &str,
    mode: &str,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let source: EntityState = serde_json::from_str(source)?;
    let target: EntityState = serde_json::from_str(target)?;
    let mode: SyncMode = mode.parse()?;

    let plan = AttributeTranslator::new(mode).translate(&source, &target)?;
    let in_sync = plan.expected.matches(&target, &ToleranceTable::default());
    let result = TranslateResult::new(plan, in_sync);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text(&result),
        other => return Err(format!("Unknown format: {other}").into()),
    }
    Ok(())
}

fn print_text(result: &TranslateResult) {
    if result.actions.is_empty() {
        println!("Nothing to mirror");
    }
    for (i, action) in result.actions.iter().enumerate() {
        println!("{}. {}", i + 1, action);
    }
    for dropped in &result.dropped {
        println!("dropped: {dropped}");
    }
    if result.in_sync {
        println!("Target already in sync, no action would be sent");
    }
}
