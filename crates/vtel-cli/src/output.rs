//! Output formatting for vtel (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Context for output rendering
#[allow(dead_code)]
pub struct OutputContext {
    pub format: OutputFormat,
    pub no_color: bool,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self {
            format,
            no_color,
            quiet,
        }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => {
                print_csv(data);
            }
        }
    }

    /// Print key-value pairs
    pub fn print_kv(&self, pairs: &[(&str, String)]) {
        match self.format {
            OutputFormat::Table => {
                for (key, value) in pairs {
                    println!("{}: {}", key.bold(), value);
                }
            }
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.clone())))
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&map).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Csv => {
                let keys: Vec<String> = pairs.iter().map(|(k, _)| escape_csv(k)).collect();
                println!("{}", keys.join(","));
                let values: Vec<String> = pairs.iter().map(|(_, v)| escape_csv(v)).collect();
                println!("{}", values.join(","));
            }
        }
    }

    /// Print an arbitrary serializable document
    ///
    /// Tables and CSV flatten nested objects into dotted keys.
    pub fn print_document<T: Serialize>(&self, data: &T) {
        let value = serde_json::to_value(data).unwrap_or_default();
        match self.format {
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Table | OutputFormat::Csv => {
                let flat = flatten_value(&value);
                let pairs: Vec<(&str, String)> =
                    flat.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
                self.print_kv(&pairs);
            }
        }
    }
}

/// Print data as CSV
fn print_csv<T: Serialize>(data: &[T]) {
    if data.is_empty() {
        return;
    }

    // Get field names from the first item
    let first = serde_json::to_value(&data[0]).unwrap_or_default();
    if let serde_json::Value::Object(map) = &first {
        let headers: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
        println!("{}", headers.join(","));

        for item in data {
            if let Ok(serde_json::Value::Object(row)) = serde_json::to_value(item) {
                let values: Vec<String> = headers
                    .iter()
                    .map(|h| row.get(*h).map(format_value).unwrap_or_default())
                    .map(|v| escape_csv(&v))
                    .collect();
                println!("{}", values.join(","));
            }
        }
    }
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render a scalar JSON value for display
pub fn format_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Flatten nested objects into `parent.child` keys, skipping nulls
fn flatten_value(value: &serde_json::Value) -> Vec<(String, String)> {
    fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, child) in map {
                    let key = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    walk(&key, child, out);
                }
            }
            serde_json::Value::Null => {}
            other => out.push((prefix.to_string(), format_value(other))),
        }
    }

    let mut out = Vec::new();
    walk("", value, &mut out);
    out
}

/// Render an optional value, `-` when absent
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Vehicle display for vehicles command
#[derive(Debug, Tabled, Serialize)]
pub struct VehicleRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Vehicle ID")]
    pub vehicle_id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "VIN")]
    pub vin: String,
    #[tabled(rename = "State")]
    pub state: String,
    #[tabled(rename = "Stream Tokens")]
    pub tokens: String,
}

/// Charging site display for chargers command
#[derive(Debug, Tabled, Serialize)]
pub struct ChargerRow {
    #[tabled(rename = "Type")]
    pub kind: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Distance (mi)")]
    pub distance_miles: String,
    #[tabled(rename = "Stalls")]
    pub stalls: String,
    #[tabled(rename = "Location")]
    pub location: String,
}

/// Telemetry display for stream command
#[derive(Debug, Tabled, Serialize)]
pub struct StreamRow {
    #[tabled(rename = "Time")]
    pub timestamp: String,
    #[tabled(rename = "Speed")]
    pub speed: String,
    #[tabled(rename = "SoC")]
    pub soc: String,
    #[tabled(rename = "Power")]
    pub power: String,
    #[tabled(rename = "Shift")]
    pub shift_state: String,
    #[tabled(rename = "Range")]
    pub range: String,
    #[tabled(rename = "Position")]
    pub position: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_flatten_nested_state() {
        let value = json!({
            "resource": "charge",
            "state": { "battery_level": 88, "charger_voltage": null, "charging_state": "Complete" }
        });

        assert_eq!(
            flatten_value(&value),
            vec![
                ("resource".to_string(), "charge".to_string()),
                ("state.battery_level".to_string(), "88".to_string()),
                ("state.charging_state".to_string(), "Complete".to_string()),
            ]
        );
    }

    #[test]
    fn test_or_dash() {
        assert_eq!(or_dash(Some(65)), "65");
        assert_eq!(or_dash::<u32>(None), "-");
    }
}
