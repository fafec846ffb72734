use serde_json::Value;

/// Print just the key answer value from the output.
///
/// Looks for well-known result fields in order of priority, then falls back
/// to the first payload field.
pub fn print_minimal(value: &Value) {
    let priority: [&[&str]; 8] = [
        &["currentPortfolio", "sharpe"],
        &["metrics", "sharpe"],
        &["var_5"],
        &["var_dollar"],
        &["optimal_weights"],
        &["worst_scenario"],
        &["weights"],
        &["points"],
    ];

    if let Value::Object(map) = value {
        for path in &priority {
            if let Some(val) = lookup(value, path) {
                if !val.is_null() {
                    println!("{}", format_minimal(val));
                    return;
                }
            }
        }

        if let Some((key, val)) = super::payload(map).next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(value));
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, k| v.get(*k))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested() {
        let v = json!({ "currentPortfolio": { "sharpe": 1.25 } });
        assert_eq!(lookup(&v, &["currentPortfolio", "sharpe"]), Some(&json!(1.25)));
        assert_eq!(lookup(&v, &["metrics", "sharpe"]), None);
    }
}
