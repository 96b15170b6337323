//! Integration tests for evidence archive creation.

use std::fs;
use std::io::Read;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;
use zip::ZipArchive;

use evidence_collector::utils::compress::{
    archive_path_for, build_manifest, compress_evidence, ArchiveFormat, CompressionLevel, CompressionProgress,
};

fn write_tree(root: &Path, files: &[(&str, &[u8])]) -> Result<()> {
    for (name, content) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

#[test]
fn test_archive_preserves_tree_and_content() -> Result<()> {
    let workspace = TempDir::new()?;
    let tree = workspace.path().join("Evidence_20240301_083000");
    let files: &[(&str, &[u8])] = &[
        ("collection_20240301_083000.log", b"[..] INFO: started\n"),
        ("live_system/processes.csv", b"PID,Name\n1,init\n"),
        ("network/arp_cache.txt", b"? (10.0.0.1) at aa:bb:cc:dd:ee:ff\n"),
        ("filesystem/deep/nested/listing.csv", b"Path,Size\n"),
    ];
    write_tree(&tree, files)?;

    let mut events: Vec<CompressionProgress> = Vec::new();
    let summary = compress_evidence(&tree, ArchiveFormat::Zip, &mut |p: &CompressionProgress| events.push(p.clone()))?
        .expect("tree holds files");

    assert_eq!(summary.archive_path, workspace.path().join("Evidence_20240301_083000.zip"));
    assert_eq!(summary.file_count, files.len());
    assert_eq!(summary.level, CompressionLevel::Best);
    assert_eq!(
        summary.original_size,
        files.iter().map(|(_, c)| c.len() as u64).sum::<u64>()
    );

    let mut archive = ZipArchive::new(fs::File::open(&summary.archive_path)?)?;
    assert_eq!(archive.len(), files.len());
    for (name, content) in files {
        let mut entry = archive.by_name(&format!("Evidence_20240301_083000/{}", name))?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        assert_eq!(&data, content);
    }

    let last = events.last().expect("final progress event");
    assert_eq!(last.files_done, files.len());
    assert_eq!(last.bytes_done, last.total_bytes);
    assert!(events.windows(2).all(|w| w[0].bytes_done <= w[1].bytes_done));
    Ok(())
}

#[test]
fn test_empty_tree_creates_no_archive() -> Result<()> {
    let workspace = TempDir::new()?;
    let tree = workspace.path().join("empty_run");
    fs::create_dir_all(tree.join("live_system"))?;

    let mut called = false;
    let result = compress_evidence(&tree, ArchiveFormat::Zip, &mut |_: &CompressionProgress| called = true)?;

    assert!(result.is_none());
    assert!(!called);
    assert!(!workspace.path().join("empty_run.zip").exists());
    Ok(())
}

#[test]
fn test_manifest_lists_every_file_once() -> Result<()> {
    let workspace = TempDir::new()?;
    let tree = workspace.path().join("run");
    write_tree(&tree, &[("a/1.txt", b"1"), ("a/2.txt", b"22"), ("b.txt", b"333")])?;

    let manifest = build_manifest(&tree)?;

    assert_eq!(manifest.file_count(), 3);
    assert_eq!(manifest.total_bytes, 6);
    let names: Vec<&str> = manifest.entries.iter().map(|e| e.archive_name.as_str()).collect();
    assert_eq!(names, vec!["run/a/1.txt", "run/a/2.txt", "run/b.txt"]);
    Ok(())
}

#[test]
fn test_archive_path_is_sibling_of_tree() -> Result<()> {
    let path = archive_path_for(Path::new("/evidence/Evidence_case"), ArchiveFormat::Zip)?;
    assert_eq!(path, Path::new("/evidence/Evidence_case.zip"));
    Ok(())
}

#[test]
fn test_unsupported_format_is_rejected() {
    let err = ArchiveFormat::parse("7z").unwrap_err();
    assert_eq!(err.to_string(), "Unsupported compression format: 7z");
    assert!(ArchiveFormat::parse("ZIP").is_ok());
}
