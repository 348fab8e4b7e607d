use regex::Regex;
use serde_json::Value;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub fn write_string_to_file(filename: &str, content: &str) -> std::io::Result<()> {
    let path = Path::new(filename);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn is_truthy(s: &str) -> bool {
    let trimmed_lowercase = s.trim().to_lowercase();
    matches!(trimmed_lowercase.as_str(), "true" | "y" | "yes" | "1")
}

/// Canonical text of an attribute value used as an identity key.
/// Null, empty strings and empty lists yield `None`.
pub fn key_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Name that does not clash with `existing`: "Merged Network", then "Merged Network (2)", ...
pub fn unique_name<'a, I>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let suffixed = Regex::new(r"^(.*) \((\d+)\)$").expect("valid regex");
    let mut taken = false;
    let mut highest = 1;

    for name in existing {
        if name == base {
            taken = true;
            continue;
        }
        if let Some(caps) = suffixed.captures(name) {
            if &caps[1] == base {
                taken = true;
                if let Ok(n) = caps[2].parse::<u32>() {
                    highest = highest.max(n);
                }
            }
        }
    }

    if taken {
        format!("{} ({})", base, highest + 1)
    } else {
        base.to_string()
    }
}
