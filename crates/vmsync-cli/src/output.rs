//! Output helpers.
//!
//! Reconciliation messages go to stdout as JSON lines. Summaries go to stderr,
//! as `key: value` lines or a single JSON object with `--json`.

use anyhow::Result;
use serde_json::Value;
use vmsync_types::ReconciliationMessage;

use crate::opts::GlobalOpts;

pub fn print_messages(messages: &[ReconciliationMessage]) -> Result<()> {
    for message in messages {
        println!("{}", serde_json::to_string(message)?);
    }
    Ok(())
}

pub fn print_summary(opts: &GlobalOpts, summary: Value) -> Result<()> {
    if opts.quiet {
        return Ok(());
    }
    if opts.json {
        eprintln!("{}", serde_json::to_string(&summary)?);
        return Ok(());
    }
    match summary {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::String(s) => eprintln!("{key}: {s}"),
                    other => eprintln!("{key}: {other}"),
                }
            }
        }
        other => eprintln!("{other}"),
    }
    Ok(())
}
