use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;
use serde_json::json;
use walkdir::WalkDir;

use crate::constants::{REPORT_HTML_NAME, REPORT_JSON_NAME};
use crate::models::{FileHashRecord, RunSummary};
use crate::utils::compress::format_bytes;

/// One file of a module's output folder.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryEntry {
    pub relative_path: String,
    pub size: u64,
    pub modified: Option<DateTime<Local>>,
    pub digests: BTreeMap<String, String>,
}

/// Files a single module left in its folder.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInventory {
    pub module: String,
    pub files: Vec<InventoryEntry>,
    pub total_size: u64,
}

/// Walk every top-level module folder of the output tree.
///
/// Digests come from the run inventory when the file was ledgered.
pub fn build_inventory(output_dir: &Path, records: &[FileHashRecord]) -> Result<Vec<ModuleInventory>> {
    let known: HashMap<&Path, &FileHashRecord> =
        records.iter().map(|r| (r.path.as_path(), r)).collect();

    let mut module_dirs: Vec<PathBuf> = fs::read_dir(output_dir)
        .context(format!("Failed to read output directory {}", output_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    module_dirs.sort();

    let mut inventory = Vec::new();
    for dir in module_dirs {
        let module = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(_) => continue,
            };
            let relative_path = entry
                .path()
                .strip_prefix(output_dir)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");

            files.push(InventoryEntry {
                relative_path,
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Local>::from),
                digests: known
                    .get(entry.path())
                    .map(|r| r.digests.clone())
                    .unwrap_or_default(),
            });
        }

        let total_size = files.iter().map(|f| f.size).sum();
        inventory.push(ModuleInventory {
            module,
            files,
            total_size,
        });
    }

    Ok(inventory)
}

/// Create the JSON summary of the collection.
pub fn create_collection_summary(summary: &RunSummary, inventory: &[ModuleInventory]) -> Result<String> {
    let total_files: usize = inventory.iter().map(|m| m.files.len()).sum();
    let total_size: u64 = inventory.iter().map(|m| m.total_size).sum();

    let document = json!({
        "run_id": summary.run_id,
        "hostname": summary.hostname,
        "os": summary.os,
        "user": summary.user,
        "started": summary.started.to_rfc3339(),
        "finished": summary.finished.to_rfc3339(),
        "collector_version": env!("CARGO_PKG_VERSION"),
        "modules": {
            "total": summary.total_modules,
            "completed": summary.completed_modules,
            "failed": summary.failed_modules.len(),
            "failed_names": summary.failed_modules,
        },
        "stopped": summary.stopped,
        "total_files": total_files,
        "total_size": total_size,
        "inventory": inventory,
    });

    serde_json::to_string_pretty(&document).context("Failed to serialize collection summary")
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the static HTML report.
pub fn render_html(summary: &RunSummary, inventory: &[ModuleInventory]) -> String {
    let total_files: usize = inventory.iter().map(|m| m.files.len()).sum();
    let total_size: u64 = inventory.iter().map(|m| m.total_size).sum();
    let failed = if summary.failed_modules.is_empty() {
        "none".to_string()
    } else {
        summary.failed_modules.join(", ")
    };

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>Evidence Collection Report - {}</title>", escape_html(&summary.hostname));
    html.push_str(
        "<style>body{font-family:sans-serif;margin:2em}table{border-collapse:collapse;width:100%}\
         th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}th{background:#eee}\
         .failed{color:#b00}</style>\n</head>\n<body>\n",
    );
    html.push_str("<h1>Evidence Collection Report</h1>\n<h2>Run Summary</h2>\n<table>\n");

    let rows = [
        ("Run ID", summary.run_id.clone()),
        ("Hostname", summary.hostname.clone()),
        ("Operating System", summary.os.clone()),
        ("User", summary.user.clone()),
        ("Started", summary.started.format("%Y-%m-%d %H:%M:%S").to_string()),
        ("Finished", summary.finished.format("%Y-%m-%d %H:%M:%S").to_string()),
        ("Modules Requested", summary.total_modules.to_string()),
        ("Modules Completed", summary.completed_modules.to_string()),
        ("Modules Failed", format!("{} ({})", summary.failed_modules.len(), failed)),
        ("Files Collected", total_files.to_string()),
        ("Total Size", format_bytes(total_size)),
    ];
    for (label, value) in rows {
        let _ = writeln!(html, "<tr><th>{}</th><td>{}</td></tr>", label, escape_html(&value));
    }
    html.push_str("</table>\n");

    if summary.stopped {
        html.push_str("<p class=\"failed\">Collection was stopped by the operator before all modules ran.</p>\n");
    }

    for module in inventory {
        let _ = writeln!(
            html,
            "<h2>{}</h2>\n<p>{} files, {}</p>",
            escape_html(&module.module),
            module.files.len(),
            format_bytes(module.total_size)
        );
        html.push_str("<table>\n<tr><th>File</th><th>Size</th><th>Modified</th><th>Digests</th></tr>\n");
        for file in &module.files {
            let modified = file
                .modified
                .map(|m| m.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            let digests = file
                .digests
                .iter()
                .map(|(alg, hex)| format!("{}: {}", alg, hex))
                .collect::<Vec<_>>()
                .join("<br>");
            let _ = writeln!(
                html,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>",
                escape_html(&file.relative_path),
                format_bytes(file.size),
                modified,
                digests
            );
        }
        html.push_str("</table>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// Write the HTML report and the JSON summary into the output root.
pub fn generate_report(
    output_dir: &Path,
    summary: &RunSummary,
    records: &[FileHashRecord],
) -> Result<(PathBuf, PathBuf)> {
    let inventory = build_inventory(output_dir, records)?;

    let html_path = output_dir.join(REPORT_HTML_NAME);
    fs::write(&html_path, render_html(summary, &inventory))
        .context(format!("Failed to write report {}", html_path.display()))?;

    let json_path = output_dir.join(REPORT_JSON_NAME);
    fs::write(&json_path, create_collection_summary(summary, &inventory)?)
        .context(format!("Failed to write summary {}", json_path.display()))?;

    info!("Report written to {}", html_path.display());
    Ok((html_path, json_path))
}
