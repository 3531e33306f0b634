use std::fs;

fn main() -> anyhow::Result<()> {
    let doc = helpdesk::docs::build_openapi();
    let s = serde_json::to_string_pretty(&doc)?;
    let path = "/tmp/openapi-generated.json";
    fs::write(path, s)?;
    println!("wrote {}", path);
    Ok(())
}
