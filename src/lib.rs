pub mod api;
pub mod boxes;
pub mod cursor;
pub mod parser;
pub mod registry;

pub use api::{json_tree, JsonBox};
pub use boxes::{BoxBody, BoxHeader, FourCC, Mp4Box};
pub use cursor::ByteCursor;
pub use parser::{parse_boxes, read_box_header, ParseError, ParseLimits, TreeBuilder};
pub use registry::{default_registry, BoxDecoder, BoxKind, BoxValue, Registry};
