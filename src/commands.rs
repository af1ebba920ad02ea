//! Command execution.

use crate::config::Config;
use crate::{Commands, MessageKind};
use colored::Colorize;
use limitd_protocol::{
    Decoder, Encoder, ProtocolError, Request, Response, ResponseFields, WireReader, WireType,
};
use serde_json::Value;

/// Executes a command and returns the formatted output.
pub fn execute(cmd: Commands, config: &Config) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Encode {
            kind,
            json,
            delimited,
        } => {
            let json = read_text_arg(&json)?;
            let bytes = match kind {
                MessageKind::Request => {
                    let request: Request = serde_json::from_str(&json)?;
                    tracing::debug!(id = %request.id, method = %request.method, "encoding request");
                    if delimited {
                        Encoder::encode_message_with_max(&request, config.codec.max_message_size)?
                    } else {
                        request.encode()
                    }
                }
                MessageKind::Response => {
                    let fields: ResponseFields = serde_json::from_str(&json)?;
                    let response = Response::try_from(fields)?;
                    tracing::debug!(
                        request_id = %response.request_id,
                        body = response.body_name(),
                        "encoding response"
                    );
                    if delimited {
                        Encoder::encode_message_with_max(&response, config.codec.max_message_size)?
                    } else {
                        response.encode()
                    }
                }
            };
            Ok(hex::encode(bytes))
        }

        Commands::Decode {
            kind,
            input,
            delimited,
        } => {
            let bytes = read_bytes_arg(&input)?;
            tracing::debug!(len = bytes.len(), delimited, "decoding {:?}", kind);

            let values = if delimited {
                decode_stream(kind, &bytes, config)?
            } else {
                vec![decode_one(kind, &bytes)?]
            };

            let mut lines = Vec::with_capacity(values.len());
            for value in &values {
                lines.push(format_json(value, config.output.pretty)?);
            }
            Ok(lines.join("\n"))
        }

        Commands::Inspect { input } => {
            let bytes = read_bytes_arg(&input)?;
            Ok(inspect(&bytes)?)
        }
    }
}

fn decode_one(kind: MessageKind, bytes: &[u8]) -> Result<Value, Box<dyn std::error::Error>> {
    let value = match kind {
        MessageKind::Request => serde_json::to_value(Request::decode(bytes).map_err(hint)?)?,
        MessageKind::Response => serde_json::to_value(Response::decode(bytes).map_err(hint)?)?,
    };
    Ok(value)
}

fn decode_stream(
    kind: MessageKind,
    bytes: &[u8],
    config: &Config,
) -> Result<Vec<Value>, Box<dyn std::error::Error>> {
    let mut decoder = Decoder::with_max_message_size(config.codec.max_message_size);
    decoder.extend(bytes);

    let mut values = Vec::new();
    loop {
        let value = match kind {
            MessageKind::Request => decoder
                .decode_request()?
                .map(serde_json::to_value)
                .transpose()?,
            MessageKind::Response => decoder
                .decode_response()?
                .map(serde_json::to_value)
                .transpose()?,
        };
        match value {
            Some(value) => values.push(value),
            None => break,
        }
    }

    if decoder.buffered() > 0 {
        return Err(format!(
            "{} trailing bytes do not form a complete message",
            decoder.buffered()
        )
        .into());
    }

    tracing::debug!(messages = values.len(), "decoded stream");
    Ok(values)
}

/// Logs a hint when the input looks cut short.
fn hint(err: ProtocolError) -> ProtocolError {
    if err.is_incomplete() {
        tracing::warn!("input ends inside a field; it may have been truncated in transit");
    }
    err
}

/// Lists every field as offset, field number, wire type and raw value.
fn inspect(bytes: &[u8]) -> Result<String, ProtocolError> {
    let mut reader = WireReader::new(bytes);
    let mut lines = Vec::new();

    while !reader.is_empty() {
        let offset = reader.position();
        let (field, wire_type) = reader.read_tag()?;
        let value = match wire_type {
            WireType::Varint => reader.read_varint()?.to_string(),
            WireType::LengthDelimited => {
                let data = reader.read_length_delimited()?;
                match std::str::from_utf8(data) {
                    Ok(s) => format!("{:?} ({} bytes)", s, data.len()),
                    Err(_) => format!("0x{} ({} bytes)", hex::encode(data), data.len()),
                }
            }
            WireType::Fixed64 | WireType::Fixed32 => {
                let start = reader.position();
                reader.skip(wire_type)?;
                format!("0x{}", hex::encode(&bytes[start..reader.position()]))
            }
        };
        lines.push(format!(
            "{:>5}  field {:<4} {:<17} {}",
            offset,
            field,
            wire_type.name().cyan(),
            value
        ));
    }

    if lines.is_empty() {
        return Ok("empty message".yellow().to_string());
    }
    Ok(lines.join("\n"))
}

/// Reads a text argument, or the file it names when prefixed with '@'.
fn read_text_arg(arg: &str) -> Result<String, Box<dyn std::error::Error>> {
    match arg.strip_prefix('@') {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => Ok(arg.to_string()),
    }
}

/// Reads hex input, or raw bytes from the file it names when prefixed with '@'.
fn read_bytes_arg(arg: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        return Ok(std::fs::read(path)?);
    }

    let digits: String = arg.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = match digits.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("0x") => &digits[2..],
        _ => &digits[..],
    };
    Ok(hex::decode(digits)?)
}

fn format_json(value: &Value, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}
