use std::io::{self, Write};

use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

pub fn render(data: &Value, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_document(&mut out, data, format, pretty)?;
    out.flush()?;
    Ok(())
}

/// json: one document. ndjson: one line per array element, or one line for
/// anything else.
fn write_document<W: Write>(
    out: &mut W,
    data: &Value,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(data)?
            } else {
                serde_json::to_string(data)?
            };
            writeln!(out, "{payload}")?;
        }
        OutputFormat::Ndjson => match data {
            Value::Array(items) => {
                for item in items {
                    writeln!(out, "{}", serde_json::to_string(item)?)?;
                }
            }
            other => writeln!(out, "{}", serde_json::to_string(other)?)?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn rendered(data: &Value, format: OutputFormat, pretty: bool) -> String {
        let mut buffer = Vec::new();
        write_document(&mut buffer, data, format, pretty).expect("render");
        String::from_utf8(buffer).expect("utf8")
    }

    #[test]
    fn ndjson_splits_arrays_into_lines() {
        let data = json!([{"a": 1}, {"b": 2}]);
        assert_eq!(
            rendered(&data, OutputFormat::Ndjson, false),
            "{\"a\":1}\n{\"b\":2}\n"
        );
    }

    #[test]
    fn json_keeps_a_single_document() {
        let data = json!({"newsapi": {"status": "ok"}});
        assert_eq!(
            rendered(&data, OutputFormat::Json, false),
            "{\"newsapi\":{\"status\":\"ok\"}}\n"
        );
        assert!(rendered(&data, OutputFormat::Json, true).contains("\n  \"newsapi\""));
    }
}
