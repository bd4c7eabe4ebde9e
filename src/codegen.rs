use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::{self, Write};
use std::str::FromStr;
use tracing::debug;

use crate::error::{JsonMapError, Result};
use crate::value::{DecodedValue, Mapping};

pub const DEFAULT_ROOT_NAME: &str = "Root";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[value(name = "typescript", alias = "ts")]
    TypeScript,
    #[value(alias = "rs")]
    Rust,
    Go,
    #[value(alias = "py")]
    Python,
    #[value(name = "csharp", alias = "cs")]
    CSharp,
    Java,
    Swift,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::TypeScript,
        Language::Rust,
        Language::Go,
        Language::Python,
        Language::CSharp,
        Language::Java,
        Language::Swift,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::TypeScript => "typescript",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Python => "python",
            Language::CSharp => "csharp",
            Language::Java => "java",
            Language::Swift => "swift",
        }
    }
}

impl FromStr for Language {
    type Err = JsonMapError;

    fn from_str(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "typescript" | "ts" => Ok(Language::TypeScript),
            "rust" | "rs" => Ok(Language::Rust),
            "go" | "golang" => Ok(Language::Go),
            "python" | "py" => Ok(Language::Python),
            "csharp" | "c#" | "cs" => Ok(Language::CSharp),
            "java" => Ok(Language::Java),
            "swift" => Ok(Language::Swift),
            _ => Err(JsonMapError::Unsupported {
                kind: "language",
                value: tag.to_string(),
            }),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FieldType {
    String,
    Integer,
    Float,
    Boolean,
    Unknown,
    Named(String),
    List(Box<FieldType>),
}

#[derive(Debug)]
struct Field {
    key: String,
    ty: FieldType,
}

#[derive(Debug)]
struct TypeDef {
    name: String,
    fields: Vec<Field>,
}

/// Walks a sample document and records one type per object, children
/// before parents.
#[derive(Default)]
struct TypeCollector {
    defs: Vec<TypeDef>,
    taken: HashSet<String>,
}

impl TypeCollector {
    fn reserve(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut suffix = 2;
        while !self.taken.insert(candidate.clone()) {
            candidate = format!("{base}{suffix}");
            suffix += 1;
        }
        candidate
    }

    fn object(&mut self, hint: &str, map: &Mapping) -> String {
        let name = self.reserve(hint);
        let fields = map
            .iter()
            .map(|(key, child)| Field {
                key: key.clone(),
                ty: self.field_type(&pascal_case(key), child),
            })
            .collect();
        self.defs.push(TypeDef {
            name: name.clone(),
            fields,
        });
        name
    }

    fn field_type(&mut self, hint: &str, value: &DecodedValue) -> FieldType {
        match value {
            DecodedValue::Null => FieldType::Unknown,
            DecodedValue::Boolean(_) => FieldType::Boolean,
            DecodedValue::Number(number) if number.is_i64() || number.is_u64() => {
                FieldType::Integer
            }
            DecodedValue::Number(_) => FieldType::Float,
            DecodedValue::String(_) => FieldType::String,
            DecodedValue::Mapping(map) => FieldType::Named(self.object(hint, map)),
            DecodedValue::Sequence(items) => FieldType::List(Box::new(match items.first() {
                Some(first) => self.field_type(&format!("{hint}Item"), first),
                None => FieldType::Unknown,
            })),
        }
    }
}

/// Source code declaring types that match the shape of `sample`.
///
/// Arrays at the root describe their first element. Nested object types are
/// named after their key in PascalCase, numbered on collision, and declared
/// before the types that use them.
pub fn generate(sample: &DecodedValue, language: Language, root_name: &str) -> Result<String> {
    let mut root = sample;
    while let DecodedValue::Sequence(items) = root {
        match items.first() {
            Some(first) => root = first,
            None => break,
        }
    }
    let DecodedValue::Mapping(map) = root else {
        return Err(JsonMapError::Unsupported {
            kind: "code generation root",
            value: root.type_name().to_string(),
        });
    };

    let root_name = match pascal_case(root_name) {
        name if name.is_empty() => DEFAULT_ROOT_NAME.to_string(),
        name => name,
    };

    let mut collector = TypeCollector::default();
    collector.object(&root_name, map);
    let defs = collector.defs;

    let mut out = String::new();
    match language {
        Language::TypeScript => typescript(&mut out, &defs)?,
        Language::Rust => rust(&mut out, &defs)?,
        Language::Go => go(&mut out, &defs)?,
        Language::Python => python(&mut out, &defs)?,
        Language::CSharp => csharp(&mut out, &defs)?,
        Language::Java => java(&mut out, &defs, &root_name)?,
        Language::Swift => swift(&mut out, &defs)?,
    }

    debug!(language = %language, types = defs.len(), "generated type definitions");
    Ok(out)
}

// ---- naming ----

fn words(key: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut previous_lower = false;

    for c in key.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            previous_lower = false;
            continue;
        }
        if c.is_uppercase() && previous_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        previous_lower = c.is_lowercase() || c.is_numeric();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn pascal_case(key: &str) -> String {
    let joined: String = words(key).iter().map(|word| capitalize(word)).collect();
    match joined.chars().next() {
        None => String::new(),
        Some(first) if first.is_numeric() => format!("Field{joined}"),
        Some(_) => joined,
    }
}

fn camel_case(key: &str) -> String {
    let pascal = pascal_case(key);
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => "field".to_string(),
    }
}

fn snake_case(key: &str) -> String {
    let joined = words(key).join("_");
    match joined.chars().next() {
        None => "field".to_string(),
        Some(first) if first.is_numeric() => format!("field_{joined}"),
        Some(_) => joined,
    }
}

const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "static", "struct", "super", "trait", "true", "type",
    "unsafe", "use", "where", "while",
];

const PYTHON_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "final", "finally",
    "float", "for", "if", "implements", "import", "int", "interface", "long", "native", "new",
    "package", "private", "protected", "public", "return", "short", "static", "super", "switch",
    "this", "throw", "throws", "try", "void", "volatile", "while",
];

const SWIFT_KEYWORDS: &[&str] = &[
    "as", "break", "case", "class", "continue", "default", "defer", "do", "else", "enum",
    "extension", "fallthrough", "for", "func", "guard", "if", "import", "in", "init", "is",
    "let", "protocol", "repeat", "return", "self", "static", "struct", "switch", "throw",
    "try", "var", "where", "while",
];

/// Applies `style` to every key, escaping keywords with a trailing
/// underscore and numbering names that collide.
fn member_names(fields: &[Field], style: fn(&str) -> String, keywords: &[&str]) -> Vec<String> {
    let mut taken = HashSet::new();
    fields
        .iter()
        .map(|field| {
            let mut base = style(&field.key);
            if keywords.contains(&base.as_str()) {
                base.push('_');
            }
            let mut candidate = base.clone();
            let mut suffix = 2;
            while !taken.insert(candidate.clone()) {
                candidate = format!("{base}{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}

fn is_plain_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn quoted(key: &str) -> String {
    serde_json::Value::String(key.to_string()).to_string()
}

// ---- emitters ----

fn type_ref(language: Language, ty: &FieldType) -> String {
    match (language, ty) {
        (_, FieldType::Named(name)) => name.clone(),
        (Language::TypeScript, FieldType::String) => "string".into(),
        (Language::TypeScript, FieldType::Integer | FieldType::Float) => "number".into(),
        (Language::TypeScript, FieldType::Boolean) => "boolean".into(),
        (Language::TypeScript, FieldType::Unknown) => "any".into(),
        (Language::TypeScript, FieldType::List(inner)) => format!("{}[]", type_ref(language, inner)),

        (Language::Rust, FieldType::String) => "String".into(),
        (Language::Rust, FieldType::Integer) => "i64".into(),
        (Language::Rust, FieldType::Float) => "f64".into(),
        (Language::Rust, FieldType::Boolean) => "bool".into(),
        (Language::Rust, FieldType::Unknown) => "Option<serde_json::Value>".into(),
        (Language::Rust, FieldType::List(inner)) => format!("Vec<{}>", type_ref(language, inner)),

        (Language::Go, FieldType::String) => "string".into(),
        (Language::Go, FieldType::Integer) => "int64".into(),
        (Language::Go, FieldType::Float) => "float64".into(),
        (Language::Go, FieldType::Boolean) => "bool".into(),
        (Language::Go, FieldType::Unknown) => "interface{}".into(),
        (Language::Go, FieldType::List(inner)) => format!("[]{}", type_ref(language, inner)),

        (Language::Python, FieldType::String) => "str".into(),
        (Language::Python, FieldType::Integer) => "int".into(),
        (Language::Python, FieldType::Float) => "float".into(),
        (Language::Python, FieldType::Boolean) => "bool".into(),
        (Language::Python, FieldType::Unknown) => "Any".into(),
        (Language::Python, FieldType::List(inner)) => format!("List[{}]", type_ref(language, inner)),

        (Language::CSharp, FieldType::String) => "string".into(),
        (Language::CSharp, FieldType::Integer) => "long".into(),
        (Language::CSharp, FieldType::Float) => "double".into(),
        (Language::CSharp, FieldType::Boolean) => "bool".into(),
        (Language::CSharp, FieldType::Unknown) => "object".into(),
        (Language::CSharp, FieldType::List(inner)) => format!("List<{}>", boxed_ref(language, inner)),

        (Language::Java, FieldType::String) => "String".into(),
        (Language::Java, FieldType::Integer) => "long".into(),
        (Language::Java, FieldType::Float) => "double".into(),
        (Language::Java, FieldType::Boolean) => "boolean".into(),
        (Language::Java, FieldType::Unknown) => "Object".into(),
        (Language::Java, FieldType::List(inner)) => format!("List<{}>", boxed_ref(language, inner)),

        (Language::Swift, FieldType::String) => "String".into(),
        (Language::Swift, FieldType::Integer) => "Int".into(),
        (Language::Swift, FieldType::Float) => "Double".into(),
        (Language::Swift, FieldType::Boolean) => "Bool".into(),
        (Language::Swift, FieldType::Unknown) => "String?".into(),
        (Language::Swift, FieldType::List(inner)) => format!("[{}]", type_ref(language, inner)),
    }
}

// Java generics cannot hold primitives.
fn boxed_ref(language: Language, ty: &FieldType) -> String {
    match (language, ty) {
        (Language::Java, FieldType::Integer) => "Long".into(),
        (Language::Java, FieldType::Float) => "Double".into(),
        (Language::Java, FieldType::Boolean) => "Boolean".into(),
        _ => type_ref(language, ty),
    }
}

fn typescript(out: &mut String, defs: &[TypeDef]) -> fmt::Result {
    for (idx, def) in defs.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        writeln!(out, "export interface {} {{", def.name)?;
        for field in &def.fields {
            let key = if is_plain_identifier(&field.key) {
                field.key.clone()
            } else {
                quoted(&field.key)
            };
            writeln!(out, "  {key}: {};", type_ref(Language::TypeScript, &field.ty))?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

fn rust(out: &mut String, defs: &[TypeDef]) -> fmt::Result {
    writeln!(out, "use serde::{{Deserialize, Serialize}};")?;
    for def in defs {
        let names = member_names(&def.fields, snake_case, RUST_KEYWORDS);
        writeln!(out)?;
        writeln!(out, "#[derive(Debug, Clone, Serialize, Deserialize)]")?;
        writeln!(out, "pub struct {} {{", def.name)?;
        for (field, name) in def.fields.iter().zip(&names) {
            if *name != field.key {
                writeln!(out, "    #[serde(rename = {})]", quoted(&field.key))?;
            }
            writeln!(out, "    pub {name}: {},", type_ref(Language::Rust, &field.ty))?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

fn go(out: &mut String, defs: &[TypeDef]) -> fmt::Result {
    for (idx, def) in defs.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let names = member_names(&def.fields, pascal_or_field, &[]);
        writeln!(out, "type {} struct {{", def.name)?;
        for (field, name) in def.fields.iter().zip(&names) {
            writeln!(
                out,
                "\t{name} {} `json:{}`",
                type_ref(Language::Go, &field.ty),
                quoted(&field.key)
            )?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

fn pascal_or_field(key: &str) -> String {
    match pascal_case(key) {
        name if name.is_empty() => "Field".to_string(),
        name => name,
    }
}

fn python(out: &mut String, defs: &[TypeDef]) -> fmt::Result {
    writeln!(out, "from dataclasses import dataclass")?;
    writeln!(out, "from typing import Any, List")?;
    for def in defs {
        let names = member_names(&def.fields, snake_case, PYTHON_KEYWORDS);
        writeln!(out)?;
        writeln!(out)?;
        writeln!(out, "@dataclass")?;
        writeln!(out, "class {}:", def.name)?;
        if def.fields.is_empty() {
            writeln!(out, "    pass")?;
        }
        for (field, name) in def.fields.iter().zip(&names) {
            writeln!(out, "    {name}: {}", type_ref(Language::Python, &field.ty))?;
        }
    }
    Ok(())
}

fn csharp(out: &mut String, defs: &[TypeDef]) -> fmt::Result {
    writeln!(out, "using System.Collections.Generic;")?;
    writeln!(out, "using System.Text.Json.Serialization;")?;
    for def in defs {
        let names = member_names(&def.fields, pascal_or_field, &[]);
        writeln!(out)?;
        writeln!(out, "public class {}", def.name)?;
        writeln!(out, "{{")?;
        for (field, name) in def.fields.iter().zip(&names) {
            writeln!(out, "    [JsonPropertyName({})]", quoted(&field.key))?;
            writeln!(
                out,
                "    public {} {name} {{ get; set; }}",
                type_ref(Language::CSharp, &field.ty)
            )?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

fn java(out: &mut String, defs: &[TypeDef], root_name: &str) -> fmt::Result {
    writeln!(out, "import java.util.List;")?;
    for def in defs {
        let names = member_names(&def.fields, camel_case, JAVA_KEYWORDS);
        let visibility = if def.name == root_name { "public " } else { "" };
        writeln!(out)?;
        writeln!(out, "{visibility}class {} {{", def.name)?;
        for (field, name) in def.fields.iter().zip(&names) {
            writeln!(out, "    public {} {name};", type_ref(Language::Java, &field.ty))?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

fn swift(out: &mut String, defs: &[TypeDef]) -> fmt::Result {
    writeln!(out, "import Foundation")?;
    for def in defs {
        let names = member_names(&def.fields, camel_case, SWIFT_KEYWORDS);
        writeln!(out)?;
        writeln!(out, "struct {}: Codable {{", def.name)?;
        for (field, name) in def.fields.iter().zip(&names) {
            writeln!(out, "    let {name}: {}", type_ref(Language::Swift, &field.ty))?;
        }

        let renamed = def.fields.iter().zip(&names).any(|(field, name)| *name != field.key);
        if renamed {
            writeln!(out)?;
            writeln!(out, "    enum CodingKeys: String, CodingKey {{")?;
            for (field, name) in def.fields.iter().zip(&names) {
                if *name == field.key {
                    writeln!(out, "        case {name}")?;
                } else {
                    writeln!(out, "        case {name} = {}", quoted(&field.key))?;
                }
            }
            writeln!(out, "    }}")?;
        }
        writeln!(out, "}}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> DecodedValue {
        DecodedValue::from(json!({
            "id": 1,
            "userName": "ann",
            "score": 9.5,
            "active": true,
            "meta": null,
            "tags": ["a"],
            "address": {"city": "x", "zip-code": "123"},
            "orders": [{"sku": "x", "qty": 2}]
        }))
    }

    #[test]
    fn splits_keys_into_words() {
        assert_eq!(pascal_case("userName"), "UserName");
        assert_eq!(pascal_case("zip-code"), "ZipCode");
        assert_eq!(pascal_case("HTTP_status"), "HttpStatus");
        assert_eq!(snake_case("userName"), "user_name");
        assert_eq!(camel_case("zip-code"), "zipCode");
        assert_eq!(pascal_case("2fa"), "Field2fa");
        assert_eq!(snake_case("$"), "field");
    }

    #[test]
    fn typescript_declares_nested_types_first() {
        let code = generate(&sample(), Language::TypeScript, "Root").unwrap();
        assert_eq!(
            code,
            "export interface Address {\n  city: string;\n  \"zip-code\": string;\n}\n\n\
             export interface OrdersItem {\n  sku: string;\n  qty: number;\n}\n\n\
             export interface Root {\n  id: number;\n  userName: string;\n  score: number;\n  \
             active: boolean;\n  meta: any;\n  tags: string[];\n  address: Address;\n  \
             orders: OrdersItem[];\n}\n"
        );
    }

    #[test]
    fn rust_renames_non_snake_keys() {
        let code = generate(&sample(), Language::Rust, "Root").unwrap();
        assert!(code.starts_with("use serde::{Deserialize, Serialize};\n"));
        assert!(code.contains("pub struct Address {"));
        assert!(code.contains("    #[serde(rename = \"zip-code\")]\n    pub zip_code: String,"));
        assert!(code.contains("    #[serde(rename = \"userName\")]\n    pub user_name: String,"));
        assert!(code.contains("    pub score: f64,"));
        assert!(code.contains("    pub meta: Option<serde_json::Value>,"));
        assert!(code.contains("    pub orders: Vec<OrdersItem>,"));
        assert!(code.find("struct Address").unwrap() < code.find("struct Root").unwrap());
    }

    #[test]
    fn go_uses_json_tags() {
        let code = generate(&sample(), Language::Go, "Root").unwrap();
        assert!(code.contains("type Root struct {"));
        assert!(code.contains("\tId int64 `json:\"id\"`"));
        assert!(code.contains("\tZipCode string `json:\"zip-code\"`"));
        assert!(code.contains("\tTags []string `json:\"tags\"`"));
        assert!(code.contains("\tMeta interface{} `json:\"meta\"`"));
    }

    #[test]
    fn python_emits_dataclasses() {
        let code = generate(&sample(), Language::Python, "Root").unwrap();
        assert!(code.contains("@dataclass\nclass Root:\n    id: int\n    user_name: str\n"));
        assert!(code.contains("    orders: List[OrdersItem]"));
        assert!(code.contains("    meta: Any"));
    }

    #[test]
    fn csharp_java_and_swift() {
        let csharp = generate(&sample(), Language::CSharp, "Root").unwrap();
        assert!(csharp.contains("    [JsonPropertyName(\"zip-code\")]\n    public string ZipCode { get; set; }"));
        assert!(csharp.contains("public List<OrdersItem> Orders { get; set; }"));

        let java = generate(&sample(), Language::Java, "Root").unwrap();
        assert!(java.contains("public class Root {"));
        assert!(java.contains("\nclass Address {"));
        assert!(java.contains("    public List<String> tags;"));
        assert!(java.contains("    public long id;"));

        let swift = generate(&sample(), Language::Swift, "Root").unwrap();
        assert!(swift.contains("struct Address: Codable {\n    let city: String\n    let zipCode: String\n"));
        assert!(swift.contains("        case zipCode = \"zip-code\""));
        assert!(swift.contains("    let orders: [OrdersItem]"));
    }

    #[test]
    fn colliding_type_names_are_numbered() {
        let value = DecodedValue::from(json!({
            "item": {"a": 1},
            "nested": {"item": {"b": 2}}
        }));
        let code = generate(&value, Language::TypeScript, "Root").unwrap();
        assert!(code.contains("export interface Item {\n  a: number;\n}"));
        assert!(code.contains("export interface Item2 {\n  b: number;\n}"));
        assert!(code.contains("  item: Item2;"));
    }

    #[test]
    fn keywords_are_escaped() {
        let value = DecodedValue::from(json!({"type": "x", "class": "y"}));
        let rust = generate(&value, Language::Rust, "Root").unwrap();
        assert!(rust.contains("    #[serde(rename = \"type\")]\n    pub type_: String,"));
        let python = generate(&value, Language::Python, "Root").unwrap();
        assert!(python.contains("    class_: str"));
    }

    #[test]
    fn array_root_describes_its_elements() {
        let value = DecodedValue::from(json!([{"id": 1}, {"id": 2}]));
        let code = generate(&value, Language::TypeScript, "Record").unwrap();
        assert_eq!(code, "export interface Record {\n  id: number;\n}\n");
    }

    #[test]
    fn scalar_root_is_rejected() {
        let err = generate(&DecodedValue::from(json!("text")), Language::Go, "Root").unwrap_err();
        assert!(matches!(err, JsonMapError::Unsupported { .. }));
    }

    #[test]
    fn parses_language_tags() {
        assert_eq!("TS".parse::<Language>().unwrap(), Language::TypeScript);
        assert_eq!("c#".parse::<Language>().unwrap(), Language::CSharp);
        assert!("cobol".parse::<Language>().is_err());
        for language in Language::ALL {
            assert_eq!(language.as_str().parse::<Language>().unwrap(), language);
        }
    }
}
