use clap::{ArgAction, Parser};
use mp4tree::{
    api::json_tree,
    boxes::{BoxBody, Mp4Box},
    cursor::ByteCursor,
    parser::{ParseLimits, TreeBuilder},
    registry::{default_registry, BoxValue, Registry},
};
use std::fs::File;
use std::io::BufReader;

#[derive(Parser, Debug)]
#[command(version, about = "Minimal MP4/ISOBMFF box tree explorer")]
struct Args {
    /// MP4/ISOBMFF file path
    path: String,

    /// Limit recursion depth
    #[arg(long, default_value_t = 64)]
    max_depth: usize,

    /// Decode payloads when a decoder exists
    #[arg(long, action = ArgAction::SetTrue)]
    decode: bool,

    /// Emit JSON instead of a human-readable tree
    #[arg(long, action = ArgAction::SetTrue)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let f = File::open(&args.path)?;

    let reg = default_registry();
    let mut cur = ByteCursor::new(BufReader::new(f));
    let boxes = TreeBuilder::new(&reg)
        .limits(ParseLimits { max_depth: args.max_depth, max_bytes: None })
        .decode_payloads(args.decode)
        .build(&mut cur, None)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&json_tree(&boxes, &reg))?);
        return Ok(());
    }

    for b in &boxes {
        print_box(b, 0, &reg);
    }
    Ok(())
}

fn print_box(b: &Mp4Box, indent: usize, reg: &Registry) {
    let pad = "  ".repeat(indent);
    let size = b
        .header
        .total_len()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "open".to_string());
    let name = reg.resolve(b.header.typ).map(|s| s.name()).unwrap_or("?");

    let mut line = format!(
        "{pad}{} size={} payload={}  {}",
        b.header.typ,
        size,
        b.payload_len(),
        name
    );
    if let Some(u) = b.header.usertype {
        line.push_str(&format!("  uuid:{}", hex::encode(u)));
    }
    println!("{line}");

    if let BoxBody::Decoded { value, .. } = &b.body {
        let text = match value {
            BoxValue::Text(s) => s.clone(),
            BoxValue::Bytes(bytes) => format!("{} bytes", bytes.len()),
            BoxValue::Structured(d) => format!("{:?}", d),
        };
        println!("{pad}  = {text}");
    }

    for c in b.children() {
        print_box(c, indent + 1, reg);
    }
}
