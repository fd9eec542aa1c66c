//! `arbor classify`: run the deterministic router on a service request.

use crate::cli::output::{print_json, print_table};
use arbor_report::{classify, is_context_edit};

#[derive(Debug)]
pub struct ClassifyArgs {
    pub text: String,
    pub json: bool,
}

pub fn run(args: ClassifyArgs) -> anyhow::Result<()> {
    let blocked = is_context_edit(&args.text);
    let route = classify(&args.text);

    if args.json {
        return print_json(&serde_json::json!({
            "route": route,
            "deterministic_hit": !route.is_none(),
            "context_edit": blocked,
        }));
    }

    let section = route
        .section
        .map_or_else(|| "-".to_string(), |s| s.label().to_string());
    print_table(
        &["Service", "Section", "Context edit"],
        vec![vec![
            route.service.to_string(),
            section,
            if blocked { "blocked" } else { "no" }.to_string(),
        ]],
    );
    if route.is_none() {
        println!("No deterministic match; the backstop classifier would be consulted.");
    }
    Ok(())
}
