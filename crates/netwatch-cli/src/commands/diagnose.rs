/// Offline diagnosis of a recorded network log.
use std::path::Path;

use anyhow::{bail, Context, Result};

use netwatch_diagnose::{analyze, load_records};
use netwatch_types::NetwatchError;

/// Run `netwatch diagnose [PATH] --format text|json`.
pub fn run(path: &Path, format: &str) -> Result<()> {
    if !matches!(format, "text" | "json") {
        bail!("unsupported format '{format}'; valid options: text, json");
    }

    let records = load_records(path)?;
    let report = match analyze(&records) {
        Ok(report) => report,
        Err(NetwatchError::NoData) => {
            println!("No network data found in {}", path.display());
            println!("Start a capture with `netwatch capture <TARGET>` first");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    match format {
        "json" => {
            let json =
                serde_json::to_string_pretty(&report).context("failed to serialize report")?;
            println!("{json}");
        }
        _ => print!("{report}"),
    }

    Ok(())
}
