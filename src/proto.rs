//! Wire-format definitions for the Apple Notes body blobs.
//!
//! Storage format: gzip-compressed protobuf in the `ZDATA` column of the
//! `ZICNOTEDATA` table. The messages below are hand-maintained prost
//! structs rather than build-script output: the schema is fixed by an
//! external, undocumented format, so the field tags are part of this
//! crate's contract and must never be renumbered.
//!
//! Tag assignments (stable, matching the on-disk format):
//! ```text
//! NoteStoreProto   document = 2
//! Document         version = 2, note = 3
//! Note             note_text = 2, attribute_run = 5 (repeated)
//! AttributeRun     length = 1, paragraph_style = 2, emphasis_style = 4,
//!                  font_weight = 5, underlined = 6, strikethrough = 7,
//!                  superscript = 8, link = 9
//! ParagraphStyle   style_type = 1, indent_amount = 4, checklist = 5,
//!                  block_quote = 8
//! Checklist        uuid = 1, done = 2
//! ```
//!
//! Fields the exporter does not interpret (fonts, colors, attachment
//! info) are left undeclared; prost skips unknown tags while decoding.
use prost::Message;

/// Outer container envelope. Some blobs wrap the [`Document`] in this
/// message, others store the document (or even a bare [`Note`]) directly.
#[derive(Clone, PartialEq, Message)]
pub struct NoteStoreProto {
    #[prost(message, optional, tag = "2")]
    pub document: Option<Document>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Document {
    #[prost(int32, optional, tag = "2")]
    pub version: Option<i32>,
    #[prost(message, optional, tag = "3")]
    pub note: Option<Note>,
}

/// The decoded note body: plain text plus a run-length styling stream.
///
/// When well-formed, the run lengths sum to the code-point length of
/// `note_text`. The decoder tolerates violations by clamping.
#[derive(Clone, PartialEq, Message)]
pub struct Note {
    #[prost(string, tag = "2")]
    pub note_text: String,
    #[prost(message, repeated, tag = "5")]
    pub attribute_run: Vec<AttributeRun>,
}

/// A contiguous span of `note_text` carrying uniform styling.
///
/// Every field except `length` is optional; absence means the run
/// carries no such attribute, which is distinct from a present zero.
#[derive(Clone, PartialEq, Message)]
pub struct AttributeRun {
    #[prost(uint32, tag = "1")]
    pub length: u32,
    #[prost(message, optional, tag = "2")]
    pub paragraph_style: Option<ParagraphStyle>,
    #[prost(int32, optional, tag = "4")]
    pub emphasis_style: Option<i32>,
    #[prost(int32, optional, tag = "5")]
    pub font_weight: Option<i32>,
    #[prost(int32, optional, tag = "6")]
    pub underlined: Option<i32>,
    #[prost(int32, optional, tag = "7")]
    pub strikethrough: Option<i32>,
    #[prost(int32, optional, tag = "8")]
    pub superscript: Option<i32>,
    #[prost(string, optional, tag = "9")]
    pub link: Option<String>,
}

/// Whole-line styling: headings, lists, checklists, quotes.
#[derive(Clone, PartialEq, Message)]
pub struct ParagraphStyle {
    /// 0-2 headings, 4 code, 100-103 / 200-203 list variants.
    #[prost(int32, optional, tag = "1")]
    pub style_type: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub indent_amount: Option<i32>,
    #[prost(message, optional, tag = "5")]
    pub checklist: Option<Checklist>,
    #[prost(int32, optional, tag = "8")]
    pub block_quote: Option<i32>,
}

/// Checkbox identity. Runs sharing a `uuid` form one checklist item.
#[derive(Clone, PartialEq, Message)]
pub struct Checklist {
    #[prost(bytes = "vec", tag = "1")]
    pub uuid: Vec<u8>,
    #[prost(int32, optional, tag = "2")]
    pub done: Option<i32>,
}
