//! Front matter codec
//!
//! Splits a post into its front matter block and body, decodes the block into
//! an ordered field map, and writes it back. Two dialects are supported,
//! chosen by the delimiter on the first line:
//!
//! - `+++` blocks hold TOML
//! - `---` blocks hold YAML
//!
//! Serialization works on the original header text rather than re-emitting the
//! decoded map, so an untouched document serializes back to exactly the bytes
//! it was parsed from. TOML edits go through `toml_edit`, which knows where
//! strings, arrays and tables begin and end. YAML edits replace or append
//! whole top-level entries and leave every other line alone.
//!
//! # Examples
//!
//! ```
//! use libposse::frontmatter::{FieldValue, FrontMatter};
//!
//! let raw = "+++\ntitle = \"Hello\"\n+++\nBody\n";
//! let mut fm = FrontMatter::parse(raw).unwrap();
//! assert_eq!(fm.serialize().unwrap(), raw);
//!
//! fm.set("syndicated", FieldValue::Bool(true));
//! assert_eq!(fm.serialize().unwrap(), "+++\ntitle = \"Hello\"\nsyndicated = true\n+++\nBody\n");
//! ```

use serde::Serialize;

use crate::error::FormatError;

/// Front matter dialect, detected from the opening delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrontMatterFormat {
    /// `+++` delimited TOML
    Toml,
    /// `---` delimited YAML
    Yaml,
}

impl FrontMatterFormat {
    pub fn delimiter(&self) -> &'static str {
        match self {
            FrontMatterFormat::Toml => "+++",
            FrontMatterFormat::Yaml => "---",
        }
    }

    fn from_delimiter_line(line: &str) -> Option<Self> {
        match line.trim() {
            "+++" => Some(FrontMatterFormat::Toml),
            "---" => Some(FrontMatterFormat::Yaml),
            _ => None,
        }
    }
}

impl std::fmt::Display for FrontMatterFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrontMatterFormat::Toml => write!(f, "toml"),
            FrontMatterFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// A decoded front matter value.
///
/// Dates, nested tables and other values the pipeline never inspects are kept
/// as their textual form in [`FieldValue::Other`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Array(Vec<FieldValue>),
    Other(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    fn from_toml(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => FieldValue::String(s),
            toml::Value::Integer(i) => FieldValue::Integer(i),
            toml::Value::Float(f) => FieldValue::Float(f),
            toml::Value::Boolean(b) => FieldValue::Bool(b),
            toml::Value::Datetime(dt) => FieldValue::Other(dt.to_string()),
            toml::Value::Array(items) => {
                FieldValue::Array(items.into_iter().map(FieldValue::from_toml).collect())
            }
            table @ toml::Value::Table(_) => FieldValue::Other(table.to_string()),
        }
    }

    fn from_yaml(value: serde_yaml::Value) -> Self {
        match value {
            serde_yaml::Value::Null => FieldValue::Null,
            serde_yaml::Value::Bool(b) => FieldValue::Bool(b),
            serde_yaml::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_yaml::Value::String(s) => FieldValue::String(s),
            serde_yaml::Value::Sequence(items) => {
                FieldValue::Array(items.into_iter().map(FieldValue::from_yaml).collect())
            }
            other => FieldValue::Other(
                serde_yaml::to_string(&other)
                    .map(|s| s.trim_end().to_string())
                    .unwrap_or_default(),
            ),
        }
    }

    fn to_toml_edit(&self) -> toml_edit::Value {
        match self {
            FieldValue::Null => "".into(),
            FieldValue::Bool(b) => (*b).into(),
            FieldValue::Integer(i) => (*i).into(),
            FieldValue::Float(f) => (*f).into(),
            FieldValue::String(s) => s.as_str().into(),
            FieldValue::Array(items) => toml_edit::Value::Array(
                items.iter().map(FieldValue::to_toml_edit).collect(),
            ),
            FieldValue::Other(raw) => raw
                .parse::<toml_edit::Value>()
                .unwrap_or_else(|_| raw.as_str().into()),
        }
    }

    // JSON scalars and flow sequences are valid YAML, and always quote strings.
    fn render_yaml(&self) -> String {
        match self {
            FieldValue::Null => "null".to_string(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::String(s) => {
                serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
            }
            FieldValue::Array(items) => {
                let rendered: Vec<String> = items.iter().map(FieldValue::render_yaml).collect();
                format!("[{}]", rendered.join(", "))
            }
            FieldValue::Other(raw) => raw.clone(),
        }
    }
}

/// Ordered key/value view of a front matter block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Replace an existing value in place, or append a new key at the end.
    pub fn insert(&mut self, key: &str, value: FieldValue) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }
}

impl FromIterator<(String, FieldValue)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        let mut fields = Fields::default();
        for (k, v) in iter {
            fields.insert(&k, v);
        }
        fields
    }
}

/// A post split into decoded front matter and an untouched body.
#[derive(Debug, Clone)]
pub struct FrontMatter {
    format: FrontMatterFormat,
    fields: Fields,
    body: String,
    opening: String,
    header: String,
    closing: String,
    dirty: Vec<String>,
}

impl FrontMatter {
    /// Parse a post's raw text.
    ///
    /// The opening delimiter must be the very first line. A delimiter that only
    /// appears after other content is reported as
    /// [`FormatError::DelimiterNotFirst`] rather than being searched for.
    pub fn parse(raw: &str) -> Result<Self, FormatError> {
        let mut lines = raw.split_inclusive('\n');

        let opening = lines.next().ok_or(FormatError::MissingDelimiter)?;
        let format = match FrontMatterFormat::from_delimiter_line(opening) {
            Some(format) => format,
            None => return Err(misplaced_delimiter(raw)),
        };
        let delimiter = format.delimiter();

        let mut offset = opening.len();
        let header_start = offset;
        let mut closing = None;
        for line in lines {
            if line.trim() == delimiter {
                closing = Some((offset, line));
                break;
            }
            offset += line.len();
        }
        let (header_end, closing) = closing.ok_or(FormatError::Unclosed(delimiter))?;

        let header = &raw[header_start..header_end];
        let body = &raw[header_end + closing.len()..];

        Ok(Self {
            format,
            fields: decode(format, header)?,
            body: body.to_string(),
            opening: opening.to_string(),
            header: header.to_string(),
            closing: closing.to_string(),
            dirty: Vec::new(),
        })
    }

    pub fn format(&self) -> FrontMatterFormat {
        self.format
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Whether any field has been changed since parsing.
    pub fn is_modified(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Set a field. Only keys set here are rewritten by [`serialize`](Self::serialize).
    pub fn set(&mut self, key: &str, value: FieldValue) {
        self.fields.insert(key, value);
        if !self.dirty.iter().any(|k| k == key) {
            self.dirty.push(key.to_string());
        }
    }

    /// Render the document in its original dialect.
    ///
    /// # Errors
    ///
    /// Fails only if a modified TOML header cannot be re-read for editing.
    pub fn serialize(&self) -> Result<String, FormatError> {
        let header = if !self.is_modified() {
            self.header.clone()
        } else {
            let eol = if self.opening.ends_with("\r\n") { "\r\n" } else { "\n" };
            match self.format {
                FrontMatterFormat::Toml => self.edited_toml_header(eol)?,
                FrontMatterFormat::Yaml => self.edited_yaml_header(eol),
            }
        };

        let mut out = String::with_capacity(
            self.opening.len() + header.len() + self.closing.len() + self.body.len(),
        );
        out.push_str(&self.opening);
        out.push_str(&header);
        out.push_str(&self.closing);
        out.push_str(&self.body);
        Ok(out)
    }

    // toml_edit keeps every untouched key, comment and table exactly as written
    fn edited_toml_header(&self, eol: &str) -> Result<String, FormatError> {
        let mut doc = self
            .header
            .parse::<toml_edit::DocumentMut>()
            .map_err(|e| FormatError::Toml(e.message().to_string()))?;
        let root = doc.as_table_mut();

        for key in &self.dirty {
            let Some(value) = self.fields.get(key) else {
                continue;
            };
            let mut value = value.to_toml_edit();
            match root.get_mut(key) {
                Some(item) => {
                    if let Some(decor) = item.as_value().map(|old| old.decor().clone()) {
                        *value.decor_mut() = decor;
                    }
                    *item = toml_edit::Item::Value(value);
                }
                None => {
                    root.insert(key, toml_edit::Item::Value(value));
                }
            }
        }

        let rendered = doc.to_string();
        if eol == "\r\n" {
            Ok(to_crlf(&rendered))
        } else {
            Ok(rendered)
        }
    }

    fn edited_yaml_header(&self, eol: &str) -> String {
        let mut lines: Vec<String> = self
            .header
            .split_inclusive('\n')
            .map(str::to_string)
            .collect();

        for key in &self.dirty {
            let Some(value) = self.fields.get(key) else {
                continue;
            };
            let entry = format!("{}: {}{}", key, value.render_yaml(), eol);

            match find_yaml_key_line(&lines, key) {
                Some(start) => {
                    let end = yaml_value_end(&lines, start);
                    lines.splice(start..end, std::iter::once(entry));
                }
                None => lines.push(entry),
            }
        }

        lines.concat()
    }
}

fn misplaced_delimiter(raw: &str) -> FormatError {
    raw.lines()
        .enumerate()
        .find(|(_, line)| !line.trim().is_empty())
        .and_then(|(idx, line)| FrontMatterFormat::from_delimiter_line(line).map(|_| idx))
        .filter(|idx| *idx > 0)
        .map(|idx| FormatError::DelimiterNotFirst(idx + 1))
        .unwrap_or(FormatError::MissingDelimiter)
}

fn decode(format: FrontMatterFormat, header: &str) -> Result<Fields, FormatError> {
    match format {
        FrontMatterFormat::Toml => {
            let table: toml::Table =
                toml::from_str(header).map_err(|e| FormatError::Toml(e.message().to_string()))?;
            Ok(table
                .into_iter()
                .map(|(k, v)| (k, FieldValue::from_toml(v)))
                .collect())
        }
        FrontMatterFormat::Yaml => {
            let value: serde_yaml::Value =
                serde_yaml::from_str(header).map_err(|e| FormatError::Yaml(e.to_string()))?;
            match value {
                serde_yaml::Value::Null => Ok(Fields::default()),
                serde_yaml::Value::Mapping(map) => Ok(map
                    .into_iter()
                    .map(|(k, v)| (yaml_key(k), FieldValue::from_yaml(v)))
                    .collect()),
                _ => Err(FormatError::NotAMapping),
            }
        }
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Promote lone `\n` line endings (from newly inserted keys) to `\r\n`.
fn to_crlf(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut prev = '\0';
    for c in text.chars() {
        if c == '\n' && prev != '\r' {
            out.push('\r');
        }
        out.push(c);
        prev = c;
    }
    out
}

/// Whether line `idx` begins outside every scalar and flow collection, i.e.
/// the lines before it form a complete YAML block on their own.
///
/// Quoted scalars may continue on unindented lines, so the text of a line
/// alone cannot tell a `key: value` line from the inside of a string.
fn yaml_boundary(lines: &[String], idx: usize) -> bool {
    let prefix = lines[..idx].concat();
    serde_yaml::from_str::<serde_yaml::Value>(&prefix).is_ok()
}

/// The key of a line that looks like an unindented mapping entry.
fn yaml_entry_key(line: &str) -> Option<&str> {
    if line.starts_with([' ', '\t', '-', '#', '\r', '\n']) {
        return None;
    }
    line.split_once(':').map(|(lhs, _)| lhs.trim())
}

/// Locate the line defining a top-level `key`.
fn find_yaml_key_line(lines: &[String], key: &str) -> Option<usize> {
    let quoted = format!("\"{}\"", key);
    let single_quoted = format!("'{}'", key);

    (0..lines.len()).find(|&idx| {
        yaml_entry_key(&lines[idx]).is_some_and(|k| k == key || k == quoted || k == single_quoted)
            && yaml_boundary(lines, idx)
    })
}

fn is_yaml_entry(lines: &[String], idx: usize) -> bool {
    yaml_entry_key(&lines[idx]).is_some() && yaml_boundary(lines, idx)
}

/// Index one past the last line of the value that starts at `start`.
///
/// Blank lines and unindented comments between this value and the next key
/// are left in place.
fn yaml_value_end(lines: &[String], start: usize) -> usize {
    let mut end = start + 1;
    while end < lines.len() && !is_yaml_entry(lines, end) {
        end += 1;
    }

    while end > start + 1 {
        let line = &lines[end - 1];
        let trivia = line.trim().is_empty() || line.starts_with('#');
        if !trivia || !yaml_boundary(lines, end - 1) {
            break;
        }
        end -= 1;
    }
    end
}
