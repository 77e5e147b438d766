//! `certsweep list` - Show the registered collectors.

use anyhow::Result;
use colored::Colorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::Context;
use crate::output::OutputFormat;

#[derive(Tabled)]
struct CollectorRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "Required")]
    required: String,
}

pub fn execute(ctx: &Context) -> Result<()> {
    let registrations = ctx.registry().registrations();

    match ctx.output_format {
        OutputFormat::Json => {
            let list: Vec<_> = registrations
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "name": r.name,
                        "description": r.description,
                        "required": r.required,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        OutputFormat::Table => {
            let rows: Vec<CollectorRow> = registrations
                .iter()
                .map(|r| CollectorRow {
                    name: r.name.to_string(),
                    description: r.description.to_string(),
                    required: if r.required.is_empty() {
                        "-".to_string()
                    } else {
                        r.required.join(", ")
                    },
                })
                .collect();

            println!("{}", Table::new(&rows).with(Style::rounded()));
            println!(
                "{}",
                "Run one with: certsweep collect <NAME> --set key=value".dimmed()
            );
        }
    }

    Ok(())
}
