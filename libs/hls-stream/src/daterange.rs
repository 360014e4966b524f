const DATERANGE_TAG: &str = "#EXT-X-DATERANGE:";

/// A single `#EXT-X-DATERANGE` entry with its raw attribute list
///
/// Values are kept as strings; quoted values have their quotes stripped.
/// Interpreting (and validating) them is left to the caller so that a
/// malformed entry never poisons the rest of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DateRange {
    attributes: Vec<(String, String)>,
}

impl DateRange {
    /// Parse a manifest line, returns `None` if it is not a date-range tag
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix(DATERANGE_TAG)?;
        Some(Self {
            attributes: parse_attribute_list(rest),
        })
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn class(&self) -> Option<&str> {
        self.attribute("CLASS")
    }

    pub fn start_date(&self) -> Option<&str> {
        self.attribute("START-DATE")
    }
}

/// Split a media manifest into its date-range entries (document order) and
/// the remaining lines.
pub fn split_manifest(content: &str) -> (Vec<DateRange>, String) {
    let mut ranges = Vec::new();
    let mut rest = String::with_capacity(content.len());
    for line in content.lines() {
        if let Some(range) = DateRange::parse(line) {
            ranges.push(range);
        } else {
            rest.push_str(line);
            rest.push('\n');
        }
    }
    (ranges, rest)
}

// Split on commas, but keep quoted values intact.
fn parse_attribute_list(rest: &str) -> Vec<(String, String)> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (idx, ch) in rest.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&rest[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < rest.len() {
        parts.push(&rest[start..]);
    }

    parts
        .into_iter()
        .filter_map(|part| {
            let (k, v) = part.split_once('=')?;
            let key = k.trim();
            if key.is_empty() {
                return None;
            }
            let mut val = v.trim();
            if let Some(stripped) = val.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                val = stripped;
            }
            Some((key.to_string(), val.to_string()))
        })
        .collect()
}
