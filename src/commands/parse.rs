use anyhow::Result;
use epacta_core::annotation;

pub fn run(text: &str) -> Result<()> {
    let metadata = annotation::parse(text);
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}
