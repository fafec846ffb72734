use colored::Colorize;
use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Numeric arrays longer than this are summarized instead of listed.
const MAX_INLINE_VALUES: usize = 8;

/// Format output as tables using the tabled crate.
///
/// Scalar payload fields go in one Field/Value table; flat objects (metrics,
/// weight maps) and arrays of records get a titled table each.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => print_envelope(map),
        Value::Array(arr) => print_array_table(arr),
        _ => println!("{}", value),
    }
}

fn print_envelope(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    let mut sections = Vec::new();
    for (key, val) in super::payload(map) {
        match val {
            Value::Object(inner) if is_flat(inner) => sections.push((key, val)),
            Value::Array(arr) if matches!(arr.first(), Some(Value::Object(_))) => {
                sections.push((key, val))
            }
            _ => builder.push_record([key.as_str(), &format_value(val)]),
        }
    }
    println!("{}", Table::from(builder));

    for (title, val) in sections {
        println!("\n{}", title.bold());
        match val {
            Value::Object(inner) => print_flat_object(inner),
            Value::Array(arr) => print_array_table(arr),
            _ => {}
        }
    }

    if let Some(Value::Array(warnings)) = map.get("warnings") {
        if !warnings.is_empty() {
            println!("\n{}", "Warnings:".yellow());
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = map.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// An object whose values are scalars or flat maps of scalars.
fn is_flat(map: &Map<String, Value>) -> bool {
    map.values().all(|v| match v {
        Value::Object(inner) => inner.values().all(|x| !x.is_object() && !x.is_array()),
        Value::Array(_) => false,
        _ => true,
    })
}

fn print_flat_object(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    println!("{}", Table::from(builder));
}

fn print_array_table(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    // Collect all keys from first object for headers
    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        let mut builder = Builder::default();
        builder.push_record(&headers);

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) if arr.len() > MAX_INLINE_VALUES => summarize(arr),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(map) if is_flat(map) => map
            .iter()
            .map(|(k, v)| format!("{}={}", k, format_value(v)))
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn summarize(arr: &[Value]) -> String {
    let nums: Vec<f64> = arr.iter().filter_map(Value::as_f64).collect();
    if nums.len() == arr.len() {
        let lo = nums.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        format!("[{} values, min {:.4}, max {:.4}]", arr.len(), lo, hi)
    } else {
        format!("[{} items]", arr.len())
    }
}
