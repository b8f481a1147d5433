//! # apple-notes-export
//!
//! A CLI tool and library that exports Apple Notes to local Markdown files.
//!
//! ## What it does
//!
//! Notes.app stores notes in a SQLite database (`NoteStore.sqlite`) with
//! gzip-compressed protobuf note bodies. This tool reads that database,
//! decompresses and decodes the bodies, and rebuilds each note's rich
//! text — headings, lists, checklists, block quotes, code, links, and
//! inline emphasis — as Markdown.
//!
//! The database is opened **read-only** — your notes are never modified.
//! Password-protected notes are detected and exported with a placeholder;
//! no decryption is attempted.
//!
//! ## Pipeline
//!
//! ```text
//! NoteStore.sqlite → store (rows) → decode (gunzip + protobuf)
//!                  → checklist / markdown → .md files
//! ```
//!
//! Each stage past the storage reader is a pure function of its input,
//! so notes can be processed independently; the `--parallel` mode fans
//! rows out to one worker per CPU.
//!
//! ## Usage
//!
//! ```sh
//! # Export the 50 most recently modified notes to a directory
//! notes-export ~/notes/apple-notes
//!
//! # Everything into one Markdown document, custom store path
//! notes-export --single all-notes.md --db /path/to/NoteStore.sqlite --limit 500
//! ```
//!
//! Preferences can be persisted in `~/.config/notes-export/config.toml`.
//!
//! ## Compatibility
//!
//! Tracks the internal (undocumented) Notes schema: notes are rows of
//! `ZICCLOUDSYNCINGOBJECT` joined to `ZICNOTEDATA` bodies, timestamps
//! on the Core Data epoch. Older schema revisions that rename the
//! modification-date column are detected and handled.

pub mod checklist;
pub mod decode;
pub mod error;
pub mod markdown;
pub mod parallel;
pub mod proto;
pub mod render;
pub mod sequential;
pub mod store;
pub mod utils;

pub use checklist::{ChecklistItem, extract_checklists};
pub use decode::{Document, ENCRYPTED_NOTE_MARKER, decode_note, fallback_content};
pub use error::{DecodeError, StoreError};
pub use markdown::{join_documents, note_to_markdown, to_markdown};
pub use store::{CORE_DATA_EPOCH_OFFSET, RawNote, StoreHandle, open_store};
