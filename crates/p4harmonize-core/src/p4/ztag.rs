use std::collections::BTreeMap;

/// One tagged record from `p4 -ztag` output.
pub type ZtagRecord = BTreeMap<String, String>;

/// Parse `p4 -ztag` output into records. Records are separated by blank
/// lines; nested `... ...` fields are dropped; untagged lines continue the
/// previous field's value.
pub fn parse_ztag(text: &str) -> Vec<ZtagRecord> {
    let mut records = Vec::new();
    let mut current = ZtagRecord::new();
    let mut last_key: Option<String> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                records.push(std::mem::take(&mut current));
            }
            last_key = None;
            continue;
        }

        if line.starts_with("... ... ") {
            last_key = None;
            continue;
        }

        if let Some(tagged) = line.strip_prefix("... ") {
            let (key, value) = tagged.split_once(' ').unwrap_or((tagged, ""));
            current.insert(key.to_string(), value.to_string());
            last_key = Some(key.to_string());
        } else if let Some(key) = &last_key {
            if let Some(value) = current.get_mut(key) {
                value.push('\n');
                value.push_str(line);
            }
        }
    }

    if !current.is_empty() {
        records.push(current);
    }
    records
}
