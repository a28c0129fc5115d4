use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;
use pex_doc::{Document, PathAddress};
use serde_json::json;

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// JSON or YAML document.
    #[arg(long)]
    pub document: PathBuf,
    /// Address such as `agents.[id==2].radius`.
    #[arg(long)]
    pub address: String,
    /// Require the address to end at a leaf.
    #[arg(long)]
    pub leaf: bool,
}

pub fn run(args: &ResolveArgs) -> Result<ExitCode, Box<dyn Error>> {
    let document = Document::load(&args.document)?;
    let address: PathAddress = args.address.parse()?;
    let resolved = if args.leaf {
        document.resolve_leaf(&address)?
    } else {
        document.resolve(&address)?
    };
    let out = json!({
        "address": address.as_str(),
        "path": resolved.path.to_string(),
        "kind": resolved.value.kind().to_string(),
        "value": resolved.value,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(ExitCode::SUCCESS)
}
