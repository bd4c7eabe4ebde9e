use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::error::{JsonMapError, Result};
use crate::value::{DecodedValue, Mapping, format_number};

/// Document formats understood by the parsing and conversion layer.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    #[serde(alias = "yml")]
    #[value(alias = "yml")]
    Yaml,
    Xml,
    Toml,
    Csv,
}

impl Format {
    pub const ALL: [Format; 5] = [
        Format::Json,
        Format::Yaml,
        Format::Xml,
        Format::Toml,
        Format::Csv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Xml => "xml",
            Format::Toml => "toml",
            Format::Csv => "csv",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" | "geojson" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "xml" => Some(Format::Xml),
            "toml" => Some(Format::Toml),
            "csv" => Some(Format::Csv),
            _ => None,
        }
    }

    /// Format implied by a file name, if its extension is known.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

impl FromStr for Format {
    type Err = JsonMapError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            "xml" => Ok(Format::Xml),
            "toml" => Ok(Format::Toml),
            "csv" => Ok(Format::Csv),
            _ => Err(JsonMapError::Unsupported {
                kind: "format",
                value: tag.to_string(),
            }),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Markup always wins over the declared tag: text whose first
/// non-whitespace character is `<` is read as XML.
pub fn detect_format(text: &str, declared: Format) -> Format {
    if text.trim_start().starts_with('<') {
        Format::Xml
    } else {
        declared
    }
}

pub fn parse(text: &str, declared: Format) -> Result<DecodedValue> {
    let format = detect_format(text, declared);
    if format != declared {
        debug!(declared = %declared, detected = %format, "format override from content");
    }

    let parsed = match format {
        Format::Json => serde_json::from_str(text).map_err(|err| JsonMapError::parse(format, err)),
        Format::Yaml => serde_yaml::from_str(text).map_err(|err| JsonMapError::parse(format, err)),
        Format::Toml => toml::from_str(text).map_err(|err| JsonMapError::parse(format, err)),
        Format::Xml => quick_xml::de::from_str(text).map_err(|err| JsonMapError::parse(format, err)),
        Format::Csv => parse_csv(text),
    }?;

    debug!(format = %format, values = parsed.node_count(), "parsed document");
    Ok(parsed)
}

fn parse_csv(text: &str) -> Result<DecodedValue> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| JsonMapError::parse(Format::Csv, err))?
        .clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| JsonMapError::parse(Format::Csv, err))?;
        let row: Mapping = headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| (header.to_string(), infer_cell(cell)))
            .collect();
        rows.push(DecodedValue::Mapping(row));
    }

    Ok(DecodedValue::Sequence(rows))
}

fn infer_cell(cell: &str) -> DecodedValue {
    if let Ok(integer) = cell.parse::<i64>() {
        return DecodedValue::Number(integer.into());
    }
    if let Ok(float) = cell.parse::<f64>() {
        if float.is_finite() {
            if let Some(number) = serde_json::Number::from_f64(float) {
                return DecodedValue::Number(number);
            }
        }
    }
    match cell {
        "true" => DecodedValue::Boolean(true),
        "false" => DecodedValue::Boolean(false),
        _ => DecodedValue::String(cell.to_string()),
    }
}

/// Re-renders `text` from `source` into `target`.
pub fn convert(text: &str, source: Format, target: Format) -> Result<String> {
    let value = parse(text, source)?;
    render(&value, target).map_err(|message| JsonMapError::Conversion {
        source_format: detect_format(text, source).to_string(),
        target_format: target.to_string(),
        message,
    })
}

/// Serializes an already decoded value. Errors carry only the message so
/// callers can wrap them with their own context.
pub fn render(value: &DecodedValue, target: Format) -> std::result::Result<String, String> {
    match target {
        Format::Json => serde_json::to_string_pretty(value).map_err(|err| err.to_string()),
        Format::Yaml => serde_yaml::to_string(value).map_err(|err| err.to_string()),
        Format::Toml => toml::to_string_pretty(value).map_err(|err| err.to_string()),
        Format::Xml => {
            quick_xml::se::to_string_with_root("root", value).map_err(|err| err.to_string())
        }
        Format::Csv => render_csv(value),
    }
}

fn render_csv(value: &DecodedValue) -> std::result::Result<String, String> {
    let rows: Vec<&DecodedValue> = match value {
        DecodedValue::Sequence(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut flattened = Vec::with_capacity(rows.len());
    let mut headers = BTreeSet::new();
    for row in rows {
        let mut cells = Vec::new();
        flatten_into(row, String::new(), &mut cells);
        headers.extend(cells.iter().map(|(key, _)| key.clone()));
        flattened.push(cells.into_iter().collect::<Mapping>());
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(headers.iter())
        .map_err(|err| err.to_string())?;

    for row in &flattened {
        let record: Vec<String> = headers
            .iter()
            .map(|header| match row.get(header) {
                None | Some(DecodedValue::Null) => String::new(),
                Some(DecodedValue::String(text)) => text.clone(),
                Some(DecodedValue::Number(number)) => format_number(number),
                Some(other) => serde_json::Value::from(other).to_string(),
            })
            .collect();
        writer.write_record(&record).map_err(|err| err.to_string())?;
    }

    let bytes = writer.into_inner().map_err(|err| err.to_string())?;
    String::from_utf8(bytes).map_err(|err| err.to_string())
}

/// Nested keys join with `.`, array positions append `[i]`.
fn flatten_into(value: &DecodedValue, prefix: String, out: &mut Vec<(String, DecodedValue)>) {
    match value {
        DecodedValue::Mapping(map) => {
            for (key, child) in map.iter() {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, path, out);
            }
        }
        DecodedValue::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, format!("{prefix}[{index}]"), out);
            }
        }
        scalar => out.push((prefix, scalar.clone())),
    }
}

/// JSON is compacted through a full parse; other formats are squeezed
/// line by line.
pub fn minify(text: &str, format: Format) -> Result<String> {
    match detect_format(text, format) {
        Format::Json => {
            let value: serde_json::Value =
                serde_json::from_str(text).map_err(|err| JsonMapError::parse(Format::Json, err))?;
            Ok(value.to_string())
        }
        _ => Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_format_tags() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("yml".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("data/config.TOML")), Some(Format::Toml));
        assert_eq!(Format::from_path(Path::new("notes.txt")), None);
        let err = "ini".parse::<Format>().unwrap_err();
        assert!(matches!(err, JsonMapError::Unsupported { kind: "format", .. }));
    }

    #[test]
    fn leading_angle_bracket_means_xml() {
        assert_eq!(detect_format("  \n<root/>", Format::Json), Format::Xml);
        assert_eq!(detect_format("{\"a\": 1}", Format::Yaml), Format::Yaml);
    }

    #[test]
    fn parses_yaml_in_document_order() {
        let value = parse("b: 1\na:\n  - x\n  - true\n", Format::Yaml).unwrap();
        assert_eq!(serde_json::Value::from(&value), json!({"b": 1, "a": ["x", true]}));
        let keys: Vec<&String> = value.as_mapping().unwrap().keys().collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn parses_toml_tables() {
        let value = parse("title = \"demo\"\n[owner]\nname = \"Tom\"\n", Format::Toml).unwrap();
        assert_eq!(
            serde_json::Value::from(&value),
            json!({"title": "demo", "owner": {"name": "Tom"}})
        );
    }

    #[test]
    fn parses_xml_elements_into_a_mapping() {
        let value = parse("<root><name>demo</name><kind>tool</kind></root>", Format::Json).unwrap();
        let map = value.as_mapping().unwrap();
        assert!(map.get("name").is_some());
        assert!(map.get("kind").is_some());
    }

    #[test]
    fn parses_csv_rows_with_inferred_cells() {
        let value = parse("name,age,active\nann,31,true\nbob,4.5,\n", Format::Csv).unwrap();
        assert_eq!(
            serde_json::Value::from(&value),
            json!([
                {"name": "ann", "age": 31, "active": true},
                {"name": "bob", "age": 4.5, "active": ""}
            ])
        );
    }

    #[test]
    fn parse_errors_name_the_format() {
        let err = parse("{\"a\": ", Format::Json).unwrap_err();
        assert_eq!(err.kind(), "parse");
        assert!(err.to_string().contains("json"));
    }

    #[test]
    fn converts_json_to_yaml() {
        let yaml = convert(r#"{"name": "x", "tags": ["a", "b"]}"#, Format::Json, Format::Yaml).unwrap();
        assert_eq!(yaml, "name: x\ntags:\n- a\n- b\n");
    }

    #[test]
    fn converts_yaml_to_pretty_json() {
        let json = convert("a: 1\nb: [true]\n", Format::Yaml, Format::Json).unwrap();
        assert_eq!(json, "{\n  \"a\": 1,\n  \"b\": [\n    true\n  ]\n}");
    }

    #[test]
    fn converts_json_to_toml() {
        let toml = convert(r#"{"name": "x", "owner": {"id": 7}}"#, Format::Json, Format::Toml).unwrap();
        assert!(toml.contains("name = \"x\""));
        assert!(toml.contains("[owner]"));
        assert!(toml.contains("id = 7"));
    }

    #[test]
    fn converts_json_to_xml_under_root_element() {
        let xml = convert(r#"{"name": "x"}"#, Format::Json, Format::Xml).unwrap();
        assert_eq!(xml, "<root><name>x</name></root>");
    }

    #[test]
    fn flattens_nested_rows_into_csv() {
        let csv = convert(
            r#"[{"id": 1, "user": {"name": "ann"}, "tags": ["a"]}, {"id": 2, "note": null, "ok": false}]"#,
            Format::Json,
            Format::Csv,
        )
        .unwrap();
        assert_eq!(
            csv,
            "id,note,ok,tags[0],user.name\n1,,,a,ann\n2,,false,,\n"
        );
    }

    #[test]
    fn null_cannot_become_toml() {
        let err = convert("null", Format::Json, Format::Toml).unwrap_err();
        assert_eq!(err.kind(), "conversion");
        assert!(err.to_string().contains("toml"));
    }

    #[test]
    fn minifies_json_and_squeezes_other_formats() {
        assert_eq!(
            minify("{\n  \"a\": [1, 2],\n  \"b\": null\n}", Format::Json).unwrap(),
            r#"{"a":[1,2],"b":null}"#
        );
        assert_eq!(minify("a: 1\n\n  b: 2\n", Format::Yaml).unwrap(), "a: 1 b: 2");
        assert!(minify("{oops", Format::Json).is_err());
    }
}
