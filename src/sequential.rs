use crate::markdown;
use crate::render::{self, NoteBody};
use crate::store::{self, RawNote};
use crate::utils::{ExportConfig, ProcessResult, file_stem, find_existing_file, parse_existing_frontmatter};
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// The main entry point for the sequential export logic.
/// Snapshots the live store, then walks the rows newest-first.
pub fn execute(config: ExportConfig) -> Result<()> {
    let snapshot = store::snapshot_database(&config.db_path)
        .wrap_err("Failed to snapshot the note store")?;
    run_internal(snapshot.path(), &config)
}

/// Export one note to its own file under the target directory.
///
/// Skips when an earlier export is already up to date (frontmatter
/// `modified` >= the row's modification date), unless forced.
pub(crate) fn export_note(raw: &RawNote, config: &ExportConfig) -> Result<ProcessResult> {
    let stem = file_stem(raw.note_id, &raw.title);
    let desired_path = config.target_dir.join(format!("{}.md", stem));
    let existing_path = find_existing_file(&config.target_dir, raw.note_id);

    if !config.force
        && let Some(ref existing) = existing_path
        && let Some(fm) = parse_existing_frontmatter(existing)
        && fm.id == Some(raw.note_id)
        && fm.modified >= raw.modified_at
    {
        return Ok(ProcessResult::Skipped);
    }

    // Rename if the title (and so the slug) changed since last export
    if let Some(ref existing) = existing_path
        && existing != &desired_path
        && let Err(e) = fs::rename(existing, &desired_path)
    {
        eprintln!(
            "Warning: could not rename {} → {}: {}",
            existing.display(),
            desired_path.display(),
            e
        );
    }

    let body = render::resolve_body(raw);

    let md_file = File::create(&desired_path)
        .wrap_err_with(|| format!("Failed to create: {}", desired_path.display()))?;
    let mut writer = BufWriter::new(md_file);
    let decoded = render::render_note(
        &mut writer,
        raw,
        &body,
        config.tags.as_deref(),
        config.verbose,
    )
    .wrap_err("Failed to write markdown")?;
    writer.flush().wrap_err("Failed to flush markdown file")?;

    Ok(if decoded {
        ProcessResult::Exported
    } else {
        ProcessResult::Undecodable
    })
}

fn run_internal(snapshot_path: &Path, config: &ExportConfig) -> Result<()> {
    fs::create_dir_all(&config.target_dir).wrap_err_with(|| {
        format!(
            "Failed to create target directory: {}",
            config.target_dir.display()
        )
    })?;

    let store = store::open_store(snapshot_path).wrap_err("Failed to open snapshot")?;
    let notes = store.list_notes(config.limit)?;

    let pb = if config.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(notes.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)",
            )
            .unwrap()
            .progress_chars("=>-"),
        );
        bar.println(format!("Found {} notes.", notes.len()));
        bar
    };

    let mut count_exported = 0usize;
    let mut count_undecodable = 0usize;
    let mut count_skipped = 0usize;
    let mut count_errors = 0usize;

    for raw in &notes {
        match export_note(raw, config) {
            Ok(ProcessResult::Exported) => {
                count_exported += 1;
                if config.verbose {
                    pb.println(format!("Exported: {}.md", file_stem(raw.note_id, &raw.title)));
                }
            }
            Ok(ProcessResult::Undecodable) => {
                count_undecodable += 1;
                if config.verbose {
                    pb.println(format!(
                        "Undecodable (kept snippet): {}.md",
                        file_stem(raw.note_id, &raw.title)
                    ));
                }
            }
            Ok(ProcessResult::Skipped) => {
                count_skipped += 1;
                if config.verbose {
                    pb.println(format!("Skipped:  {}.md", file_stem(raw.note_id, &raw.title)));
                }
            }
            Err(e) => {
                count_errors += 1;
                pb.println(format!("Error [{}]: {:#}", raw.note_id, e));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    if !config.quiet {
        let mut summary = format!(
            "Done. {} exported, {} skipped, {} undecodable.",
            count_exported, count_skipped, count_undecodable
        );
        if count_errors > 0 {
            summary.push_str(&format!(" Completed with {} error(s).", count_errors));
        }
        eprintln!("{}", summary);
    }

    Ok(())
}

/// Concatenate every note into a single Markdown document, written to
/// `output` or stdout.
pub fn execute_single(config: &ExportConfig, output: Option<&Path>) -> Result<()> {
    let snapshot = store::snapshot_database(&config.db_path)
        .wrap_err("Failed to snapshot the note store")?;
    let store = store::open_store(snapshot.path()).wrap_err("Failed to open snapshot")?;
    let notes = store.list_notes(config.limit)?;

    let mut undecodable = 0usize;
    let parts: Vec<String> = notes
        .iter()
        .map(|raw| {
            let body = render::resolve_body(raw);
            if matches!(body, NoteBody::Fallback(_)) {
                undecodable += 1;
            }
            render::note_markdown(raw, &body)
        })
        .collect();
    let document = markdown::join_documents(parts);

    match output {
        Some(path) => {
            fs::write(path, &document)
                .wrap_err_with(|| format!("Failed to write: {}", path.display()))?;
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(document.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    if !config.quiet {
        let mut summary = format!("Done. {} note(s) in one document.", notes.len());
        if undecodable > 0 {
            summary.push_str(&format!(" {} undecodable.", undecodable));
        }
        eprintln!("{}", summary);
    }

    Ok(())
}
