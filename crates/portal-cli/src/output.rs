use crate::cli::OutputFormat;
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", to_pretty(value)),
        OutputFormat::Table => print_as_table(value),
    }
}

/// Prints `rows` under `header`, or the rows as a JSON array of objects.
pub fn print_rows(header: &[&str], rows: &[Vec<String>], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let objects: Vec<Value> = rows
                .iter()
                .map(|row| {
                    Value::Object(
                        header
                            .iter()
                            .zip(row)
                            .map(|(h, v)| (h.to_ascii_lowercase(), Value::String(v.clone())))
                            .collect(),
                    )
                })
                .collect();
            println!("{}", to_pretty(&Value::Array(objects)));
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("Nothing found.");
                return;
            }
            let mut builder = Builder::default();
            builder.push_record(header.iter().copied());
            for row in rows {
                builder.push_record(row.iter().map(String::as_str));
            }
            let table = builder.build().with(Style::rounded()).to_string();
            println!("{table}");
        }
    }
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

// Top-level keys become sections; flat objects become two-column tables.
fn print_as_table(value: &Value) {
    let Some(obj) = value.as_object() else {
        println!("{}", to_pretty(value));
        return;
    };
    let mut builder = Builder::default();
    let mut scalars = 0;
    for (key, item) in obj {
        match item {
            Value::Object(inner) => {
                println!("{}", key.cyan());
                let mut section = Builder::default();
                for (k, v) in inner {
                    section.push_record([k.clone(), scalar(v)]);
                }
                let table = section.build().with(Style::rounded()).to_string();
                println!("{table}");
            }
            other => {
                builder.push_record([key.clone(), scalar(other)]);
                scalars += 1;
            }
        }
    }
    if scalars > 0 {
        let table = builder.build().with(Style::rounded()).to_string();
        println!("{table}");
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
