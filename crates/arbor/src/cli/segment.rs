//! `arbor segment`: show how an utterance splits into section scopes.

use crate::cli::output::{print_json, print_table};
use anyhow::Context;
use arbor_report::{segment, segment_or_cursor, SectionId};

#[derive(Debug)]
pub struct SegmentArgs {
    pub text: String,
    pub cursor: String,
    pub json: bool,
}

pub fn run(args: SegmentArgs) -> anyhow::Result<()> {
    let cursor: SectionId = args
        .cursor
        .parse()
        .with_context(|| format!("Invalid --cursor '{}'", args.cursor))?;

    let scoped = !segment(&args.text, cursor).is_empty();
    let segments = segment_or_cursor(&args.text, cursor);

    if args.json {
        return print_json(&serde_json::json!({
            "cursor": cursor,
            "scoped": scoped,
            "segments": segments,
        }));
    }

    let rows = segments
        .iter()
        .enumerate()
        .map(|(idx, seg)| {
            let payload = if seg.is_navigation_only() {
                "(navigation only)".to_string()
            } else {
                seg.payload.clone()
            };
            vec![(idx + 1).to_string(), seg.section.label().to_string(), payload]
        })
        .collect();
    print_table(&["#", "Section", "Payload"], rows);
    if !scoped {
        println!("No explicit scope; the whole utterance goes to {}.", cursor.label());
    }
    Ok(())
}
