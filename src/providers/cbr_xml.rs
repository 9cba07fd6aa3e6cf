//! Decoder for the `ValCurs`/`Valute` daily rates document.
//!
//! The document is a root element with repeated `Valute` children:
//!
//! ```xml
//! <ValCurs Date="18.10.2026" name="Foreign Currency Market">
//!   <Valute ID="R01235">
//!     <NumCode>840</NumCode>
//!     <CharCode>USD</CharCode>
//!     <Nominal>1</Nominal>
//!     <Name>Доллар США</Name>
//!     <Value>91,2345</Value>
//!   </Valute>
//! </ValCurs>
//! ```
//!
//! The publisher declares `windows-1251`; the reader honours the encoding
//! named in the XML declaration.

use crate::core::{ParseError, RateRecord};
use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;
use std::str::FromStr;

const CURRENCY_TAG: &[u8] = b"Valute";
const RATE_SCALE: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    CharCode,
    Name,
    Value,
    Nominal,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"CharCode" => Some(Field::CharCode),
            b"Name" => Some(Field::Name),
            b"Value" => Some(Field::Value),
            b"Nominal" => Some(Field::Nominal),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct PendingRecord {
    code: Option<String>,
    name: Option<String>,
    value: Option<String>,
    nominal: Option<String>,
    closed: Vec<Field>,
}

impl PendingRecord {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::CharCode => &mut self.code,
            Field::Name => &mut self.name,
            Field::Value => &mut self.value,
            Field::Nominal => &mut self.nominal,
        }
    }

    /// Starts collecting `field`. Repeated elements after the first are
    /// ignored, returning false.
    fn open(&mut self, field: Field) -> bool {
        if self.closed.contains(&field) {
            return false;
        }
        self.slot(field).get_or_insert_with(String::new);
        true
    }

    fn close(&mut self, field: Field) {
        self.closed.push(field);
    }

    fn push_text(&mut self, field: Field, text: &str) {
        self.slot(field).get_or_insert_with(String::new).push_str(text);
    }

    fn finish(self, index: usize) -> Result<RateRecord, ParseError> {
        let field_error = |field: &'static str, reason: String| ParseError::Field {
            index,
            field,
            reason,
        };

        let code = self
            .code
            .ok_or_else(|| field_error("CharCode", "element is missing".into()))?;
        if code.chars().count() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(field_error(
                "CharCode",
                format!("expected a 3-letter code, got '{code}'"),
            ));
        }

        let name = self
            .name
            .ok_or_else(|| field_error("Name", "element is missing".into()))?;

        let raw_value = self
            .value
            .ok_or_else(|| field_error("Value", "element is missing".into()))?;
        let rate = parse_rate(&raw_value).map_err(|reason| field_error("Value", reason))?;

        let nominal = match self.nominal {
            None => 1,
            Some(raw) => parse_nominal(&raw).map_err(|reason| field_error("Nominal", reason))?,
        };

        Ok(RateRecord {
            code,
            name,
            rate,
            nominal,
        })
    }
}

/// Parses a rate written with a comma as the fractional separator.
pub fn parse_rate(raw: &str) -> Result<Decimal, String> {
    let normalized = raw.trim().replace(',', ".");
    Decimal::from_str(&normalized)
        .map(|rate| rate.round_dp(RATE_SCALE))
        .map_err(|_| format!("'{raw}' is not a decimal number"))
}

fn parse_nominal(raw: &str) -> Result<i32, String> {
    match raw.trim().parse::<i32>() {
        Ok(n) if n >= 1 => Ok(n),
        Ok(n) => Err(format!("expected a positive unit count, got {n}")),
        Err(_) => Err(format!("'{raw}' is not an integer")),
    }
}

/// Decodes the feed into records in document order. Any bad element fails
/// the whole document.
pub fn parse(bytes: &[u8]) -> Result<Vec<RateRecord>, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut seen_root = false;
    let mut root_closed = false;
    let mut current: Option<PendingRecord> = None;
    let mut field: Option<Field> = None;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(|e| {
            ParseError::Xml(format!("{e} at position {}", reader.buffer_position()))
        })?;

        if root_closed && !is_trailing_whitespace(&event) {
            return Err(ParseError::Xml(format!(
                "content after the root element at position {}",
                reader.buffer_position()
            )));
        }

        match event {
            Event::Start(tag) => {
                depth += 1;
                match depth {
                    1 => seen_root = true,
                    2 if tag.local_name().as_ref() == CURRENCY_TAG => {
                        current = Some(PendingRecord::default());
                    }
                    3 => {
                        let tag_field = Field::from_tag(tag.local_name().as_ref());
                        field = match (tag_field, current.as_mut()) {
                            (Some(f), Some(record)) => record.open(f).then_some(f),
                            _ => None,
                        };
                    }
                    _ => field = None,
                }
            }
            Event::Empty(tag) => match depth {
                0 => {
                    seen_root = true;
                    root_closed = true;
                }
                1 if tag.local_name().as_ref() == CURRENCY_TAG => {
                    let index = records.len() + 1;
                    records.push(PendingRecord::default().finish(index)?);
                }
                2 => {
                    if let (Some(f), Some(record)) =
                        (Field::from_tag(tag.local_name().as_ref()), current.as_mut())
                    {
                        if record.open(f) {
                            record.close(f);
                        }
                    }
                }
                _ => {}
            },
            Event::Text(text) => {
                if let (Some(f), Some(record)) = (field, current.as_mut()) {
                    let text = text
                        .unescape()
                        .map_err(|e| ParseError::Xml(e.to_string()))?;
                    record.push_text(f, &text);
                }
            }
            Event::CData(data) => {
                if let (Some(f), Some(record)) = (field, current.as_mut()) {
                    let text = data.decode().map_err(|e| ParseError::Xml(e.to_string()))?;
                    record.push_text(f, &text);
                }
            }
            Event::End(_) => {
                match depth {
                    3 => {
                        if let (Some(f), Some(record)) = (field.take(), current.as_mut()) {
                            record.close(f);
                        }
                    }
                    2 => {
                        if let Some(record) = current.take() {
                            let index = records.len() + 1;
                            records.push(record.finish(index)?);
                        }
                    }
                    1 => root_closed = true,
                    _ => {}
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(ParseError::Xml("document has no root element".into()));
    }
    if depth != 0 {
        return Err(ParseError::Xml(format!(
            "unexpected end of document with {depth} unclosed element(s)"
        )));
    }
    Ok(records)
}

/// Only whitespace, comments and processing instructions may follow the root.
fn is_trailing_whitespace(event: &Event<'_>) -> bool {
    match event {
        Event::Text(text) => text.iter().all(u8::is_ascii_whitespace),
        Event::Comment(_) | Event::PI(_) | Event::Eof => true,
        _ => false,
    }
}
