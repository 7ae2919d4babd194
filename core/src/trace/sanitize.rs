use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_MARKERS: &[&str] = &["password", "token", "key", "secret"];

pub const DEFAULT_MAX_STRING_LENGTH: usize = 1000;
pub const DEFAULT_MAX_LIST_ITEMS: usize = 10;

/// Shrinks trace payloads before they leave the process: sensitive keys are
/// redacted, lists are cut to `max_list_items` and strings to
/// `max_string_length` characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitizer {
    max_string_length: usize,
    max_list_items: usize,
    redact: bool,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            max_list_items: DEFAULT_MAX_LIST_ITEMS,
            redact: true,
        }
    }
}

impl Sanitizer {
    pub fn new(max_string_length: usize, max_list_items: usize) -> Self {
        Self {
            max_string_length,
            max_list_items,
            redact: true,
        }
    }

    pub fn with_redaction(mut self, redact: bool) -> Self {
        self.redact = redact;
        self
    }

    pub fn sanitize(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| {
                        if self.redact && is_sensitive(key) {
                            (key.clone(), Value::String(REDACTED.to_string()))
                        } else {
                            (key.clone(), self.sanitize(value))
                        }
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .take(self.max_list_items)
                    .map(|item| self.sanitize(item))
                    .collect(),
            ),
            Value::String(s) => Value::String(self.truncate(s)),
            other => other.clone(),
        }
    }

    fn truncate(&self, s: &str) -> String {
        if s.chars().count() > self.max_string_length {
            let head: String = s.chars().take(self.max_string_length).collect();
            format!("{head}...")
        } else {
            s.to_string()
        }
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_nested_sensitive_keys() {
        let sanitized = Sanitizer::default().sanitize(&json!({
            "service": {"Auth_Token": "abc", "url": "http://x"},
            "password": "hunter2",
        }));

        assert_eq!(sanitized["password"], REDACTED);
        assert_eq!(sanitized["service"]["Auth_Token"], REDACTED);
        assert_eq!(sanitized["service"]["url"], "http://x");
    }

    #[test]
    fn truncates_lists_and_strings() {
        let sanitizer = Sanitizer::new(5, 2);
        let sanitized = sanitizer.sanitize(&json!({
            "items": [1, 2, 3, 4],
            "text": "abcdefghij",
            "short": "abc",
        }));

        assert_eq!(sanitized["items"], json!([1, 2]));
        assert_eq!(sanitized["text"], "abcde...");
        assert_eq!(sanitized["short"], "abc");
    }

    #[test]
    fn redaction_can_be_disabled() {
        let sanitized = Sanitizer::default()
            .with_redaction(false)
            .sanitize(&json!({"secret": "visible"}));
        assert_eq!(sanitized["secret"], "visible");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let sanitized = Sanitizer::new(3, 10).sanitize(&json!("ééééé"));
        assert_eq!(sanitized, json!("ééé..."));
    }
}
