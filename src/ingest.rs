//! External data ingestion: `read_file(path [, options])`.
//!
//! Adapts an external byte stream into a lazy BAG of [`ExprValue`]s, one
//! element per logical record. The default format is the self-describing
//! container format (a stream of JSON values decoded independently); the
//! rest are delimited-text dialects driven by the `csv` crate.
//!
//! Configuration is validated when the function is called - an unknown
//! `type` or option key fails before any byte of the source is read. The
//! file itself opens only when iteration begins; the handle lives inside
//! the returned iterator and is released when the iterator is dropped,
//! even if consumption stops early. Re-iterating the bag re-opens the
//! file and yields the same element sequence.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::rc::Rc;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::env::Environment;
use crate::evaluator::EvalError;
use crate::functions::{Absorption, ExprFunction, FunctionSignature, TypeConstraint};
use crate::value::{Bag, BagSource, ExprType, ExprValue, ValueIter};

/// The record format of an ingested stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Self-describing container format: a stream of JSON values, each
    /// decoded independently. The default when no `type` is given.
    Json,
    /// Comma-separated, double-quote quoting
    Csv,
    /// Tab-separated
    Tsv,
    /// Spreadsheet-export comma-separated
    ExcelCsv,
    /// MySQL dump: tab-separated, backslash escapes, no quoting
    MysqlCsv,
    /// PostgreSQL COPY csv
    PostgresqlCsv,
    /// PostgreSQL COPY text: tab-separated, backslash escapes, no quoting
    PostgresqlText,
    /// Comma-separated base, fully driven by the remaining options
    Customized,
}

impl Format {
    fn from_name(name: &str) -> Result<Format, EvalError> {
        match name {
            "json" => Ok(Format::Json),
            "csv" => Ok(Format::Csv),
            "tsv" => Ok(Format::Tsv),
            "excel_csv" => Ok(Format::ExcelCsv),
            "mysql_csv" => Ok(Format::MysqlCsv),
            "postgresql_csv" => Ok(Format::PostgresqlCsv),
            "postgresql_text" => Ok(Format::PostgresqlText),
            "customized" => Ok(Format::Customized),
            other => Err(EvalError::Configuration(format!(
                "unknown file type '{}'",
                other
            ))),
        }
    }
}

/// How delimited-text fields become scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Every field stays a string
    None,
    /// Infer int, decimal, float, boolean, and null from the field text
    Auto,
}

impl Conversion {
    fn from_name(name: &str) -> Result<Conversion, EvalError> {
        match name {
            "none" => Ok(Conversion::None),
            "auto" => Ok(Conversion::Auto),
            other => Err(EvalError::Configuration(format!(
                "unknown conversion '{}'",
                other
            ))),
        }
    }
}

/// Parsed, validated ingestion options.
///
/// Every recognized key has a named, typed field here; anything else in
/// the options struct is rejected explicitly rather than silently
/// ignored.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub format: Format,
    pub header: bool,
    pub ignore_empty_line: bool,
    pub ignore_surrounding_space: bool,
    pub trim: bool,
    pub delimiter: Option<char>,
    pub line_breaker: Option<String>,
    pub escape: Option<char>,
    pub quote: Option<char>,
    pub conversion: Conversion,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            format: Format::Json,
            header: false,
            ignore_empty_line: true,
            ignore_surrounding_space: true,
            trim: true,
            delimiter: None,
            line_breaker: None,
            escape: None,
            quote: None,
            conversion: Conversion::None,
        }
    }
}

impl ReadOptions {
    /// Parses an options struct, rejecting unknown keys and mistyped
    /// values with Configuration errors.
    pub fn from_struct(options: &ExprValue) -> Result<Self, EvalError> {
        let fields = match options {
            ExprValue::Struct(fields) => fields,
            other => {
                return Err(EvalError::Configuration(format!(
                    "read options must be a struct, got {}",
                    other.type_tag()
                )));
            }
        };

        let mut parsed = ReadOptions::default();
        for (key, value) in fields {
            match key.as_str() {
                "type" => parsed.format = Format::from_name(string_option(key, value)?)?,
                "encoding" => {
                    let encoding = string_option(key, value)?;
                    if !encoding.eq_ignore_ascii_case("utf-8")
                        && !encoding.eq_ignore_ascii_case("utf8")
                    {
                        return Err(EvalError::Configuration(format!(
                            "unsupported encoding '{}' (only UTF-8)",
                            encoding
                        )));
                    }
                }
                "header" => parsed.header = bool_option(key, value)?,
                "ignore_empty_line" => parsed.ignore_empty_line = bool_option(key, value)?,
                "ignore_surrounding_space" => {
                    parsed.ignore_surrounding_space = bool_option(key, value)?;
                }
                "trim" => parsed.trim = bool_option(key, value)?,
                "delimiter" => parsed.delimiter = Some(char_option(key, value)?),
                "line_breaker" => {
                    parsed.line_breaker = Some(string_option(key, value)?.to_string());
                }
                "escape" => parsed.escape = Some(char_option(key, value)?),
                "quote" => parsed.quote = Some(char_option(key, value)?),
                "conversion" => {
                    parsed.conversion = Conversion::from_name(string_option(key, value)?)?;
                }
                unknown => {
                    return Err(EvalError::Configuration(format!(
                        "unknown option '{}'",
                        unknown
                    )));
                }
            }
        }

        // Terminators are validated here, not at first iteration.
        parsed.terminator()?;
        Ok(parsed)
    }

    fn terminator(&self) -> Result<Option<csv::Terminator>, EvalError> {
        match self.line_breaker.as_deref() {
            None => Ok(None),
            Some("\r\n") => Ok(Some(csv::Terminator::CRLF)),
            Some(s) if s.len() == 1 && s.is_ascii() => {
                Ok(Some(csv::Terminator::Any(s.as_bytes()[0])))
            }
            Some(other) => Err(EvalError::Configuration(format!(
                "line_breaker must be one ASCII character or \"\\r\\n\", got {:?}",
                other
            ))),
        }
    }

    /// The csv reader configuration for the selected dialect plus any
    /// per-call overrides.
    fn reader_builder(&self) -> Result<csv::ReaderBuilder, EvalError> {
        let mut builder = csv::ReaderBuilder::new();
        builder.has_headers(self.header).flexible(true);

        match self.format {
            Format::Json => {
                return Err(EvalError::Configuration(
                    "container format has no delimited-text reader".to_string(),
                ));
            }
            Format::Csv | Format::ExcelCsv | Format::Customized => {}
            Format::Tsv => {
                builder.delimiter(b'\t');
            }
            Format::MysqlCsv | Format::PostgresqlText => {
                builder.delimiter(b'\t').quoting(false).escape(Some(b'\\'));
            }
            Format::PostgresqlCsv => {}
        }

        // The two flags act independently: `trim` strips header and
        // field whitespace, `ignore_surrounding_space` fields only.
        if self.trim {
            builder.trim(csv::Trim::All);
        } else if self.ignore_surrounding_space {
            builder.trim(csv::Trim::Fields);
        }
        if let Some(delimiter) = self.delimiter {
            builder.delimiter(ascii_byte("delimiter", delimiter)?);
        }
        if let Some(quote) = self.quote {
            builder.quote(ascii_byte("quote", quote)?);
        }
        if let Some(escape) = self.escape {
            builder.escape(Some(ascii_byte("escape", escape)?));
        }
        if let Some(terminator) = self.terminator()? {
            builder.terminator(terminator);
        }

        Ok(builder)
    }
}

fn string_option<'a>(key: &str, value: &'a ExprValue) -> Result<&'a str, EvalError> {
    value.string_value().ok_or_else(|| {
        EvalError::Configuration(format!("option '{}' must be a string", key))
    })
}

fn bool_option(key: &str, value: &ExprValue) -> Result<bool, EvalError> {
    value.boolean_value().ok_or_else(|| {
        EvalError::Configuration(format!("option '{}' must be a boolean", key))
    })
}

fn char_option(key: &str, value: &ExprValue) -> Result<char, EvalError> {
    let text = string_option(key, value)?;
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(ch),
        _ => Err(EvalError::Configuration(format!(
            "option '{}' must be a single character",
            key
        ))),
    }
}

fn ascii_byte(key: &str, ch: char) -> Result<u8, EvalError> {
    if ch.is_ascii() {
        Ok(ch as u8)
    } else {
        Err(EvalError::Configuration(format!(
            "option '{}' must be an ASCII character",
            key
        )))
    }
}

/// Restartable producer over one file: every `open` re-opens the path
/// from the beginning.
pub struct FileSource {
    path: PathBuf,
    options: ReadOptions,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, options: ReadOptions) -> Self {
        FileSource {
            path: path.into(),
            options,
        }
    }
}

impl BagSource for FileSource {
    fn open(&self) -> Result<ValueIter, EvalError> {
        let file = File::open(&self.path).map_err(|e| {
            EvalError::Resource(format!("cannot open '{}': {}", self.path.display(), e))
        })?;

        match self.options.format {
            Format::Json => Ok(json_records(file)),
            _ => delimited_records(file, &self.options),
        }
    }
}

/// The container format: a stream of JSON values, each decoded
/// independently. The deserializer owns the file handle.
fn json_records(file: File) -> ValueIter {
    let stream = serde_json::Deserializer::from_reader(BufReader::new(file))
        .into_iter::<serde_json::Value>();
    ValueIter::new(Box::new(stream.map(|item| {
        item.map(ExprValue::from_json)
            .map_err(|e| EvalError::Resource(format!("cannot decode record: {}", e)))
    })))
}

/// A delimited-text stream: one struct per record, fields named by the
/// header row or positionally (`_1`, `_2`, ...). The record iterator
/// owns the reader, which owns the file handle.
fn delimited_records(file: File, options: &ReadOptions) -> Result<ValueIter, EvalError> {
    let mut reader = options.reader_builder()?.from_reader(file);

    let headers: Option<Vec<String>> = if options.header {
        let record = reader
            .headers()
            .map_err(|e| EvalError::Resource(format!("cannot read header row: {}", e)))?;
        Some(record.iter().map(str::to_string).collect())
    } else {
        None
    };

    let conversion = options.conversion;
    let ignore_empty_line = options.ignore_empty_line;

    let records = reader.into_records().filter_map(move |item| match item {
        Err(e) => Some(Err(EvalError::Resource(format!(
            "cannot read record: {}",
            e
        )))),
        Ok(record) => {
            if ignore_empty_line && record.iter().all(str::is_empty) {
                return None;
            }
            let fields = record
                .iter()
                .enumerate()
                .map(|(index, raw)| {
                    let name = headers
                        .as_ref()
                        .and_then(|h| h.get(index).cloned())
                        .unwrap_or_else(|| format!("_{}", index + 1));
                    (name, convert_field(raw, conversion))
                })
                .collect();
            Some(Ok(ExprValue::Struct(fields)))
        }
    });

    Ok(ValueIter::new(Box::new(records)))
}

fn convert_field(raw: &str, conversion: Conversion) -> ExprValue {
    match conversion {
        Conversion::None => ExprValue::String(raw.to_string()),
        Conversion::Auto => {
            if raw == "null" {
                return ExprValue::Null;
            }
            if raw == "true" {
                return ExprValue::Boolean(true);
            }
            if raw == "false" {
                return ExprValue::Boolean(false);
            }
            if let Ok(n) = raw.parse::<i64>() {
                return ExprValue::Int(n);
            }
            if looks_like_float(raw) {
                if let Ok(f) = raw.parse::<f64>() {
                    return ExprValue::Float(f);
                }
            } else if let Ok(d) = Decimal::from_str(raw) {
                return ExprValue::Decimal(d);
            }
            ExprValue::String(raw.to_string())
        }
    }
}

fn looks_like_float(raw: &str) -> bool {
    raw.contains(['e', 'E'])
}

/// `READ_FILE(path [, options])` - the ingestion entry point registered
/// with the built-in functions.
pub fn read_file_function() -> ExprFunction {
    ExprFunction {
        signature: FunctionSignature {
            name: "read_file".to_string(),
            required: vec![TypeConstraint::Exactly(ExprType::String)],
            optional: Some(TypeConstraint::Exactly(ExprType::Struct)),
            variadic: None,
            returns: TypeConstraint::Exactly(ExprType::Bag),
        },
        absorption: Absorption::None,
        body: read_file_body,
    }
}

fn read_file_body(_env: &Environment, args: &[ExprValue]) -> Result<ExprValue, EvalError> {
    let path = match args[0].string_value() {
        Some(path) => path.to_string(),
        None => {
            return Err(EvalError::Type(
                "read_file: path must be a string".to_string(),
            ));
        }
    };

    // Option validation happens here, before any byte of the source is
    // read; the file opens only when the bag is iterated.
    let options = match args.get(1) {
        Some(opts) => ReadOptions::from_struct(opts)?,
        None => ReadOptions::default(),
    };

    Ok(ExprValue::Bag(Bag::Lazy(Rc::new(FileSource::new(
        path, options,
    )))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: Vec<(&str, ExprValue)>) -> ExprValue {
        ExprValue::Struct(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    #[test]
    fn missing_type_defaults_to_container_format() {
        let parsed = ReadOptions::from_struct(&options(vec![])).unwrap();
        assert_eq!(parsed.format, Format::Json);
    }

    #[test]
    fn unknown_type_is_a_configuration_error() {
        let err = ReadOptions::from_struct(&options(vec![(
            "type",
            ExprValue::String("parquet".to_string()),
        )]))
        .unwrap_err();
        assert!(matches!(err, EvalError::Configuration(_)));
    }

    #[test]
    fn unknown_option_key_is_rejected() {
        let err = ReadOptions::from_struct(&options(vec![(
            "delimeter",
            ExprValue::String(";".to_string()),
        )]))
        .unwrap_err();
        assert!(matches!(err, EvalError::Configuration(_)));
    }

    #[test]
    fn mistyped_option_value_is_rejected() {
        let err = ReadOptions::from_struct(&options(vec![("header", ExprValue::Int(1))]))
            .unwrap_err();
        assert!(matches!(err, EvalError::Configuration(_)));
    }

    #[test]
    fn auto_conversion_infers_scalars() {
        assert_eq!(convert_field("5", Conversion::Auto), ExprValue::Int(5));
        assert_eq!(
            convert_field("2.5", Conversion::Auto),
            ExprValue::Decimal(Decimal::from_str("2.5").unwrap())
        );
        assert_eq!(convert_field("1e3", Conversion::Auto), ExprValue::Float(1e3));
        assert_eq!(
            convert_field("true", Conversion::Auto),
            ExprValue::Boolean(true)
        );
        assert_eq!(convert_field("null", Conversion::Auto), ExprValue::Null);
        assert_eq!(
            convert_field("kumo", Conversion::Auto),
            ExprValue::String("kumo".to_string())
        );
        assert_eq!(
            convert_field("5", Conversion::None),
            ExprValue::String("5".to_string())
        );
    }
}
