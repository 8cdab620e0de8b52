//! `stepwise tools`: list the built-in tools.

use stepwise_core::{ToolDescriptor, ToolRegistry};

pub async fn run(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let descriptors = stepwise_tools::default_registry().descriptors();
    if json {
        println!("{}", serde_json::to_string_pretty(&descriptors)?);
    } else {
        print!("{}", render(&descriptors));
    }
    Ok(())
}

fn render(descriptors: &[ToolDescriptor]) -> String {
    let width = descriptors.iter().map(|d| d.name.len()).max().unwrap_or(0);
    let mut out = format!("  {} built-in tool(s)\n\n", descriptors.len());
    for d in descriptors {
        out.push_str(&format!("  {:<width$}  {}\n", d.name, d.description));
    }
    out
}
