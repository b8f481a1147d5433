//! Body-blob decoding: gzip sniffing, the three-attempt protobuf
//! cascade, and the fallback content for bodies nothing can decode.

use crate::error::DecodeError;
use crate::proto;
use crate::store::RawNote;
use flate2::read::GzDecoder;
use log::debug;
use prost::Message;
use std::io::Read;

/// Substituted for password-protected bodies we cannot read.
pub const ENCRYPTED_NOTE_MARKER: &str = "[Encrypted Note - Cannot decrypt without password]";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A successfully decoded note body.
///
/// Unlike the wire [`proto::Document`], the note is always present here;
/// a parse that yields no note does not count as a decode.
#[derive(Debug, Clone)]
pub struct Document {
    pub version: i32,
    pub note: proto::Note,
}

/// Undo the gzip framing if the blob carries it.
///
/// Decompression failure is recoverable: the original bytes are handed
/// to the protobuf cascade unchanged. Large bodies stream through the
/// decoder into a growing buffer.
pub fn decompress_body(blob: &[u8]) -> Vec<u8> {
    if blob.len() < 2 || blob[..2] != GZIP_MAGIC {
        return blob.to_vec();
    }
    let mut out = Vec::new();
    match GzDecoder::new(blob).read_to_end(&mut out) {
        Ok(_) => out,
        Err(e) => {
            debug!("gzip-framed body failed to decompress ({e}), using raw bytes");
            blob.to_vec()
        }
    }
}

/// Decode a raw note row into a [`Document`].
///
/// The canonical buffer is tried as, in order:
/// 1. a `NoteStoreProto` container wrapping the document,
/// 2. a `Document` directly,
/// 3. a bare `Note`, which gets wrapped.
///
/// The first attempt that produces an actual note wins. When all three
/// fail the body is encrypted or malformed; the caller degrades to
/// [`fallback_content`] instead of dropping the note.
pub fn decode_note(raw: &RawNote) -> Result<Document, DecodeError> {
    let blob = raw.body_blob.as_deref().ok_or(DecodeError::EmptyBody)?;
    let buf = decompress_body(blob);
    decode_body(&buf)
}

pub fn decode_body(buf: &[u8]) -> Result<Document, DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::EmptyBody);
    }

    if let Ok(container) = proto::NoteStoreProto::decode(buf)
        && let Some(document) = container.document
        && let Some(note) = document.note.filter(has_content)
    {
        debug!("decoded via container envelope");
        return Ok(Document {
            version: document.version.unwrap_or_default(),
            note,
        });
    }

    if let Ok(document) = proto::Document::decode(buf)
        && let Some(note) = document.note.filter(has_content)
    {
        debug!("decoded as document");
        return Ok(Document {
            version: document.version.unwrap_or_default(),
            note,
        });
    }

    if let Ok(note) = proto::Note::decode(buf)
        && has_content(&note)
    {
        debug!("decoded as bare note");
        return Ok(Document { version: 0, note });
    }

    Err(DecodeError::Exhausted)
}

// Any buffer of unknown tags parses as an all-default message, so a
// "successful" parse only counts when it carried something.
fn has_content(note: &proto::Note) -> bool {
    !note.note_text.is_empty() || !note.attribute_run.is_empty()
}

/// Best-effort content for a note whose body failed to decode.
///
/// Prefers the store's own plain-text snippet. Unprotected bodies get
/// one salvage attempt over the raw bytes; protected ones go straight
/// to the marker. The salvaged output is not stable across versions.
pub fn fallback_content(raw: &RawNote) -> String {
    let snippet = raw.snippet.trim();
    if !snippet.is_empty() {
        return snippet.to_string();
    }
    if !raw.is_password_protected()
        && let Some(blob) = raw.body_blob.as_deref()
        && let Some(preview) = printable_preview(&decompress_body(blob))
    {
        return preview;
    }
    ENCRYPTED_NOTE_MARKER.to_string()
}

// Salvage printable text out of uninterpreted bytes: lossy-decode,
// drop control characters, collapse whitespace. Rejects buffers that
// are mostly binary noise.
fn printable_preview(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let mut out = String::new();
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else if !c.is_control() && c != '\u{fffd}' {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }

    let letters = out.chars().filter(|c| c.is_alphanumeric()).count();
    if out.len() < 8 || letters * 2 < out.chars().count() {
        return None;
    }
    Some(out)
}
