use crate::boxes::{BoxBody, Mp4Box};
use crate::registry::{BoxValue, Registry, StructuredData};
use serde::Serialize;

/// A JSON-serializable view of a single box.
///
/// This is a pure projection of the owned tree (the source stream is
/// forward-only, so nothing is re-read), suitable for UIs, CLIs, or APIs.
#[derive(Serialize)]
pub struct JsonBox {
    /// Absolute byte offset of this box in the stream
    pub offset: u64,
    /// Total extent including header, `None` for open-ended boxes
    pub size: Option<u64>,
    /// Bytes consumed by the header (8, 16, 24, or 32)
    pub header_len: u64,
    /// Payload bytes this box covered
    pub payload_len: u64,
    /// Whether the declared size was the open-ended sentinel
    pub open_ended: bool,

    /// Four-character box type code (e.g. "ftyp", "moov")
    pub typ: String,
    /// Usertype for uuid boxes (16-byte hex string)
    pub usertype: Option<String>,
    /// Box classification: "container", "leaf", or "unknown"
    pub kind: String,
    /// Human-readable box type name from the registry, if known
    pub name: Option<String>,
    /// Decoded content summary if a decoder ran
    pub decoded: Option<String>,
    /// Structured data if a structured decoder ran
    pub structured_data: Option<StructuredData>,
    /// Child boxes for container types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<JsonBox>>,
}

/// Project an owned box tree into its JSON view.
pub fn json_tree(boxes: &[Mp4Box], registry: &Registry) -> Vec<JsonBox> {
    boxes.iter().map(|b| project(b, registry)).collect()
}

fn project(b: &Mp4Box, registry: &Registry) -> JsonBox {
    let hdr = &b.header;
    let name = registry.resolve(hdr.typ).map(|s| s.name().to_string());

    let (kind, decoded, structured_data, children) = match &b.body {
        BoxBody::Container(kids) => (
            "container",
            None,
            None,
            Some(kids.iter().map(|c| project(c, registry)).collect()),
        ),
        BoxBody::Leaf { .. } => ("leaf", None, None, None),
        BoxBody::Decoded { value, .. } => {
            let (text, data) = render_value(value);
            ("leaf", Some(text), data, None)
        }
        BoxBody::Opaque { .. } => ("unknown", None, None, None),
    };

    JsonBox {
        offset: hdr.start,
        size: hdr.total_len(),
        header_len: hdr.header_len,
        payload_len: b.payload_len(),
        open_ended: hdr.is_open_ended(),
        typ: hdr.typ.to_string(),
        usertype: hdr.usertype.map(hex::encode),
        kind: kind.to_string(),
        name,
        decoded,
        structured_data,
        children,
    }
}

fn render_value(value: &BoxValue) -> (String, Option<StructuredData>) {
    match value {
        BoxValue::Text(s) => (s.clone(), None),
        BoxValue::Bytes(bytes) => (format!("{} bytes", bytes.len()), None),
        BoxValue::Structured(data) => (format!("structured: {:?}", data), Some(data.clone())),
    }
}
