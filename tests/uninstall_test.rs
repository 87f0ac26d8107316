// SPDX-License-Identifier: MIT
//! Shim and config-dir cleanup against a temp directory layout.

use tempfile::TempDir;

use launchpad::logsink::MemorySink;
use launchpad::uninstall::{purge_config_dir, remove_shims_in};

#[test]
fn removes_exactly_the_existing_shim_files() {
    let tmp = TempDir::new().unwrap();
    let bin = tmp.path();

    std::fs::write(bin.join("toolx"), "#!/bin/sh\n").unwrap();
    std::fs::write(bin.join("toolx.cmd"), "@echo off\n").unwrap();
    // No toolx.ps1; its absence must be reported, not treated as an error.
    std::fs::write(bin.join("unrelated"), "keep me\n").unwrap();

    let sink = MemorySink::new();
    let deleted = remove_shims_in(bin, "toolx", &sink);

    assert_eq!(deleted.len(), 2);
    assert!(!bin.join("toolx").exists());
    assert!(!bin.join("toolx.cmd").exists());
    assert!(bin.join("unrelated").exists(), "unrelated files stay");
    assert!(sink.contains("File not found"));
}

#[test]
fn shim_removal_with_nothing_present_deletes_nothing() {
    let tmp = TempDir::new().unwrap();
    let sink = MemorySink::new();

    let deleted = remove_shims_in(tmp.path(), "toolx", &sink);
    assert!(deleted.is_empty());
}

#[test]
fn purges_existing_config_dir_recursively() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join(".toolx");
    std::fs::create_dir_all(config.join("sessions")).unwrap();
    std::fs::write(config.join("settings.json"), "{}").unwrap();
    std::fs::write(config.join("sessions").join("s1.json"), "{}").unwrap();

    let sink = MemorySink::new();
    assert!(purge_config_dir(tmp.path(), ".toolx", &sink));
    assert!(!config.exists());
    assert!(sink.contains("Configuration folder deleted"));
}

#[test]
fn purge_is_a_noop_when_config_dir_is_absent() {
    let tmp = TempDir::new().unwrap();
    let sink = MemorySink::new();

    assert!(!purge_config_dir(tmp.path(), ".toolx", &sink));
    assert!(sink.contains("does not exist"));
}
