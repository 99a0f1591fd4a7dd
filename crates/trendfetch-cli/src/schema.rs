use anyhow::Context;
use trendfetch_core::payload_schema;

pub fn run() -> anyhow::Result<()> {
    let schema = payload_schema().context("embedded payload schema is invalid")?;
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
