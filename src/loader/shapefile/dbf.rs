//! `.dbf` (dBASE III) attribute decoding

use crate::error::ParseError;
use crate::geojson::Properties;
use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDate;
use serde_json::{Number, Value};

const HEADER_LEN: usize = 32;
const DESCRIPTOR_LEN: usize = 32;
const HEADER_TERMINATOR: u8 = 0x0D;

/// Text encoding of character fields, chosen from the `.cpg` sidecar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

impl TextEncoding {
    /// UTF-8 unless a `.cpg` names some other code page
    pub fn from_cpg(cpg: Option<&[u8]>) -> Self {
        let Some(bytes) = cpg else {
            return TextEncoding::Utf8;
        };
        let name = String::from_utf8_lossy(bytes).trim().to_ascii_uppercase();
        let name = name.replace(|c: char| matches!(c, '-' | '_' | ' '), "");
        if name.is_empty() || name == "UTF8" || name == "65001" {
            TextEncoding::Utf8
        } else {
            TextEncoding::Latin1
        }
    }

    fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct FieldDescriptor {
    name: String,
    kind: u8,
    length: usize,
    decimals: u8,
}

/// Decodes all records of a `.dbf` file into property maps, in file order
pub fn read_records(bytes: &[u8], encoding: TextEncoding) -> Result<Vec<Properties>, ParseError> {
    if bytes.len() < HEADER_LEN {
        return Err(ParseError::Shapefile(format!(
            ".dbf header needs {} bytes, got {}",
            HEADER_LEN,
            bytes.len()
        )));
    }

    let num_records = LittleEndian::read_u32(&bytes[4..8]) as usize;
    let header_len = LittleEndian::read_u16(&bytes[8..10]) as usize;
    let record_len = LittleEndian::read_u16(&bytes[10..12]) as usize;

    let fields = read_descriptors(bytes, header_len, encoding)?;
    let fields_len: usize = fields.iter().map(|f| f.length).sum();
    if record_len < fields_len + 1 {
        return Err(ParseError::Shapefile(format!(
            ".dbf record length {} is shorter than its fields ({})",
            record_len,
            fields_len + 1
        )));
    }

    let needed = header_len.saturating_add(num_records.saturating_mul(record_len));
    if needed > bytes.len() {
        return Err(ParseError::Shapefile(format!(
            ".dbf declares {} records but is truncated",
            num_records
        )));
    }

    let mut records = Vec::with_capacity(num_records);
    for index in 0..num_records {
        let start = header_len + index * record_len;
        // first byte is the deletion flag
        let mut offset = start + 1;
        let mut properties = Properties::with_capacity(fields.len());
        for field in &fields {
            let raw = &bytes[offset..offset + field.length];
            properties.insert(field.name.clone(), decode_field(field, raw, encoding));
            offset += field.length;
        }
        records.push(properties);
    }

    Ok(records)
}

fn read_descriptors(
    bytes: &[u8],
    header_len: usize,
    encoding: TextEncoding,
) -> Result<Vec<FieldDescriptor>, ParseError> {
    let limit = header_len.min(bytes.len());
    let mut fields = Vec::new();
    let mut offset = HEADER_LEN;

    while offset < limit && bytes[offset] != HEADER_TERMINATOR {
        if offset + DESCRIPTOR_LEN > limit {
            return Err(ParseError::Shapefile("truncated .dbf field descriptor".to_string()));
        }
        let descriptor = &bytes[offset..offset + DESCRIPTOR_LEN];
        let name_end = descriptor[..11].iter().position(|&b| b == 0).unwrap_or(11);
        fields.push(FieldDescriptor {
            name: encoding.decode(&descriptor[..name_end]).trim().to_string(),
            kind: descriptor[11],
            length: descriptor[16] as usize,
            decimals: descriptor[17],
        });
        offset += DESCRIPTOR_LEN;
    }

    Ok(fields)
}

fn decode_field(field: &FieldDescriptor, raw: &[u8], encoding: TextEncoding) -> Value {
    match field.kind {
        b'N' | b'F' => {
            let text = encoding.decode(raw);
            let text = text.trim();
            if text.is_empty() || text.starts_with('*') {
                return Value::Null;
            }
            if field.decimals == 0 {
                if let Ok(int) = text.parse::<i64>() {
                    return Value::from(int);
                }
            }
            text.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        b'L' => match raw.first() {
            Some(b'T' | b't' | b'Y' | b'y') => Value::Bool(true),
            Some(b'F' | b'f' | b'N' | b'n') => Value::Bool(false),
            _ => Value::Null,
        },
        b'D' => {
            let text = encoding.decode(raw);
            NaiveDate::parse_from_str(text.trim(), "%Y%m%d")
                .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null)
        }
        // Visual FoxPro binary integer and double
        b'I' if raw.len() == 4 => Value::from(LittleEndian::read_i32(raw)),
        b'O' if raw.len() == 8 => Number::from_f64(LittleEndian::read_f64(raw))
            .map(Value::Number)
            .unwrap_or(Value::Null),
        _ => Value::String(encoding.decode(raw).trim().to_string()),
    }
}
