//! Output formatting utilities.

use aq_protocol_saml::{Assertion, Attribute};
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use crate::config::OutputFormat;

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Prints an info message.
pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

/// One attribute of a returned assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Tabled)]
pub struct AttributeRow {
    /// Attribute name.
    #[tabled(rename = "Name")]
    pub name: String,

    /// Friendly name, if the IdP sent one.
    #[tabled(rename = "Friendly Name")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub friendly_name: String,

    /// Values, joined with `, ` in tables.
    #[tabled(rename = "Values", display_with = "join_values")]
    pub values: Vec<String>,
}

fn join_values(values: &[String]) -> String {
    values.join(", ")
}

impl From<&Attribute> for AttributeRow {
    fn from(attribute: &Attribute) -> Self {
        Self {
            name: attribute.name.clone(),
            friendly_name: attribute.friendly_name.clone().unwrap_or_default(),
            values: attribute.values.iter().map(|v| v.value.clone()).collect(),
        }
    }
}

/// Collects the attributes of `assertion` in document order.
pub fn attribute_rows(assertion: &Assertion) -> Vec<AttributeRow> {
    assertion.attributes().map(AttributeRow::from).collect()
}

/// Outputs attribute rows in the specified format.
pub fn output_attributes(rows: &[AttributeRow], format: OutputFormat) -> crate::CliResult<()> {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                info("No attributes returned.");
            } else {
                let table = Table::new(rows).with(Style::rounded()).to_string();
                println!("{table}");
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(rows)?;
            println!("{json}");
        }
        OutputFormat::Quiet => {
            for value in rows.iter().flat_map(|row| &row.values) {
                println!("{value}");
            }
        }
    }
    Ok(())
}

/// Outputs a single item.
pub fn output_single<T: Serialize>(item: &T, format: OutputFormat) -> crate::CliResult<()> {
    match format {
        OutputFormat::Table => {
            let json = serde_json::to_value(item)?;
            print_value(&json, 0);
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(item)?;
            println!("{json}");
        }
        OutputFormat::Quiet => {}
    }
    Ok(())
}

/// Prints a JSON value as indented `key: value` lines.
fn print_value(value: &serde_json::Value, indent: usize) {
    let prefix = "  ".repeat(indent);

    match value {
        serde_json::Value::Array(arr) => {
            for item in arr {
                if item.is_object() {
                    println!("{prefix}-");
                    print_value(item, indent + 1);
                } else {
                    println!("{prefix}- {}", scalar(item));
                }
            }
        }
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                if val.is_object() || val.is_array() {
                    println!("{prefix}{key}:");
                    print_value(val, indent + 1);
                } else {
                    println!("{prefix}{key}: {}", scalar(val));
                }
            }
        }
        other => println!("{prefix}{}", scalar(other)),
    }
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
