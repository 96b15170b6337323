//! Chain-of-custody ledger rows.

use chrono::{DateTime, Local};

use crate::models::{CollectionRecord, Severity};

/// Header row written once when a ledger is opened.
pub const LEDGER_HEADER: &str =
    "Timestamp,Level,Module,Action,Status,Details,File_Path,File_Size,Hash_MD5,Hash_SHA1,Hash_SHA256";

/// Digest columns, in header order.
const DIGEST_COLUMNS: [&str; 3] = ["md5", "sha1", "sha256"];

/// Quote a field when it carries a delimiter, quote or line break.
pub fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render one ledger row (no trailing newline).
pub fn format_row(
    timestamp: &DateTime<Local>,
    severity: Severity,
    module: &str,
    record: &CollectionRecord,
) -> String {
    let mut fields = vec![
        timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        severity.as_str().to_string(),
        escape_csv(module),
        escape_csv(&record.action),
        escape_csv(&record.status),
        escape_csv(&record.details),
        escape_csv(&record.file_path),
        record.file_size.to_string(),
    ];

    for column in DIGEST_COLUMNS {
        fields.push(record.digests.get(column).cloned().unwrap_or_default());
    }

    fields.join(",")
}
