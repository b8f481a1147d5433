use crate::sequential::export_note;
use crate::store;
use crate::utils::{ExportConfig, ProcessResult};
use crossbeam_channel::{SendTimeoutError, bounded};
use eyre::{Context, Result};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Parallel export: fan note ids out over a bounded queue to scoped
/// workers, each holding its own read-only connection to the snapshot.
///
/// Notes are independent of each other, so per-note work parallelizes
/// freely; only the id listing is ordered. File naming is id-prefixed,
/// so workers never contend for the same output path.
pub fn execute(config: ExportConfig) -> Result<()> {
    fs::create_dir_all(&config.target_dir).wrap_err("Failed to create target dir")?;

    let snapshot = store::snapshot_database(&config.db_path)
        .wrap_err("Failed to snapshot the note store")?;
    let snapshot_path = snapshot.path();

    let ids: Vec<i64> = {
        let store = store::open_store(snapshot_path).wrap_err("Failed to open snapshot")?;
        store.note_ids(config.limit)?
    };

    let (tx, rx) = bounded::<i64>(256);
    let count_exported = AtomicUsize::new(0);
    let count_undecodable = AtomicUsize::new(0);
    let count_skipped = AtomicUsize::new(0);
    let count_errors = AtomicUsize::new(0);
    let n_workers = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(8);

    std::thread::scope(|s| {
        for _ in 0..n_workers {
            let rx = rx.clone();
            let (config, count_exported, count_undecodable, count_skipped, count_errors) = (
                &config,
                &count_exported,
                &count_undecodable,
                &count_skipped,
                &count_errors,
            );

            s.spawn(move || {
                let store = match store::open_store(snapshot_path) {
                    Ok(s) => s,
                    Err(e) => {
                        eprintln!("Worker store open failed: {:#}", e);
                        return;
                    }
                };

                while let Ok(id) = rx.recv() {
                    let raw = match store.fetch_note(id) {
                        Ok(Some(raw)) => raw,
                        Ok(None) => continue,
                        Err(e) => {
                            count_errors.fetch_add(1, Ordering::Relaxed);
                            eprintln!("Error fetching [{}]: {:#}", id, e);
                            continue;
                        }
                    };

                    match export_note(&raw, config) {
                        Ok(ProcessResult::Exported) => {
                            count_exported.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(ProcessResult::Undecodable) => {
                            count_undecodable.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(ProcessResult::Skipped) => {
                            count_skipped.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            count_errors.fetch_add(1, Ordering::Relaxed);
                            eprintln!("Error [{}]: {:#}", id, e);
                        }
                    }
                }
            });
        }

        drop(rx);

        'outer: for id in &ids {
            let mut pending = *id;
            loop {
                match tx.send_timeout(pending, Duration::from_millis(50)) {
                    Ok(()) => break,
                    Err(SendTimeoutError::Disconnected(_)) => break 'outer,
                    Err(SendTimeoutError::Timeout(r)) => {
                        pending = r;
                    }
                }
            }
        }

        drop(tx);
    });

    if !config.quiet {
        let mut summary = format!(
            "Done. {} exported, {} skipped, {} undecodable.",
            count_exported.load(Ordering::Relaxed),
            count_skipped.load(Ordering::Relaxed),
            count_undecodable.load(Ordering::Relaxed),
        );
        let errors = count_errors.load(Ordering::Relaxed);
        if errors > 0 {
            summary.push_str(&format!(" Completed with {} error(s).", errors));
        }
        eprintln!("{}", summary);
    }

    Ok(())
}
