//! Atom/OData entity codec.
//!
//! Writes carry one `<entry>` with a single `content/m:properties`
//! block. Reads walk every `m:properties` block in a feed (or a lone
//! entry) and turn it into a [`TableRecord`], in document order.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use storage_core::StorageError;

use crate::record::TableRecord;
use crate::value::{EDM_DATETIME, PropertyValue, parse_datetime};

pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub const METADATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices/metadata";
pub const DATA_NS: &str = "http://schemas.microsoft.com/ado/2007/08/dataservices";

const PARTITION_KEY: &str = "PartitionKey";
const ROW_KEY: &str = "RowKey";
const TIMESTAMP: &str = "Timestamp";

// ═══════════════════════════════════════════════════════════════
//  Encode
// ═══════════════════════════════════════════════════════════════

/// Encode one entity as an Atom `<entry>` document.
///
/// Date-time values are tagged `m:type="Edm.DateTime"`, everything else
/// is written as text. `PartitionKey` and `RowKey` always come last.
pub fn encode_entry<'a, I>(partition_key: &str, row_key: &str, properties: I) -> Result<String, StorageError>
where
    I: IntoIterator<Item = (&'a str, &'a PropertyValue)>,
{
    let mut writer = Writer::new(Vec::new());

    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), Some("yes"))))?;
    write(
        &mut writer,
        Event::Start(BytesStart::new("entry").with_attributes([
            ("xmlns", ATOM_NS),
            ("xmlns:m", METADATA_NS),
            ("xmlns:d", DATA_NS),
        ])),
    )?;
    write(
        &mut writer,
        Event::Start(BytesStart::new("content").with_attributes([("type", "application/xml")])),
    )?;
    write(&mut writer, Event::Start(BytesStart::new("m:properties")))?;

    for (name, value) in properties {
        validate_property_name(name)?;
        let text = value.to_string();
        write_property(&mut writer, name, value.edm_type(), &text)?;
    }
    write_property(&mut writer, PARTITION_KEY, None, partition_key)?;
    write_property(&mut writer, ROW_KEY, None, row_key)?;

    write(&mut writer, Event::End(BytesEnd::new("m:properties")))?;
    write(&mut writer, Event::End(BytesEnd::new("content")))?;
    write(&mut writer, Event::End(BytesEnd::new("entry")))?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| StorageError::Encode(format!("entry is not UTF-8: {e}")))
}

/// [`encode_entry`] for a whole record.
pub fn encode_record(partition_key: &str, record: &TableRecord) -> Result<String, StorageError> {
    encode_entry(
        partition_key,
        record.row_key(),
        record.properties.iter().map(|(k, v)| (k.as_str(), v)),
    )
}

fn write_property(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    edm_type: Option<&str>,
    text: &str,
) -> Result<(), StorageError> {
    let tag = format!("d:{name}");
    let mut start = BytesStart::new(tag.as_str());
    if let Some(t) = edm_type {
        start.push_attribute(("m:type", t));
    }
    write(writer, Event::Start(start))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(tag.as_str())))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), StorageError> {
    writer
        .write_event(event)
        .map_err(|e| StorageError::Encode(e.to_string()))
}

/// Property names become element names, and the key/timestamp names are
/// owned by the service.
fn validate_property_name(name: &str) -> Result<(), StorageError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if !valid {
        return Err(StorageError::precondition(format!("invalid property name '{name}'")));
    }
    if name == PARTITION_KEY || name == ROW_KEY || name == TIMESTAMP {
        return Err(StorageError::precondition(format!(
            "'{name}' is a system property and cannot be written as data"
        )));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
//  Decode
// ═══════════════════════════════════════════════════════════════

/// Decode every `m:properties` block of a response body.
///
/// A body with no `m:properties` block is a valid empty page; a body
/// with no root element at all is a decode error. Null and empty values
/// decode to `""`, except under `Edm.DateTime`, where they fail to parse.
pub fn decode_entries(body: &[u8]) -> Result<Vec<TableRecord>, StorageError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| StorageError::decode(format!("response body is not UTF-8: {e}")))?;
    let mut reader = NsReader::from_str(text);

    let mut records = Vec::new();
    let mut saw_root = false;
    let mut depth = 0usize;
    // Depth of the open m:properties element, with its entity.
    let mut entity: Option<(usize, EntityBuilder)> = None;
    let mut field: Option<FieldBuilder> = None;

    loop {
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|e| StorageError::decode(format!("malformed XML: {e}")))?;
        let in_metadata = is_namespace(&ns, METADATA_NS);
        let in_data = is_namespace(&ns, DATA_NS);

        let open_props = entity.as_ref().map(|(d, _)| *d);

        match event {
            Event::Start(e) => {
                saw_root = true;
                depth += 1;
                match open_props {
                    Some(props_depth) => {
                        if field.is_none() && depth == props_depth + 1 {
                            field = Some(FieldBuilder::start(&reader, &e, in_data)?);
                        }
                    }
                    None => {
                        if in_metadata && e.local_name().as_ref() == b"properties" {
                            entity = Some((depth, EntityBuilder::default()));
                        }
                    }
                }
            }
            Event::Empty(e) => {
                saw_root = true;
                match (open_props, entity.as_mut()) {
                    (Some(props_depth), Some((_, builder))) => {
                        if field.is_none() && depth == props_depth {
                            builder.finish_field(FieldBuilder::start(&reader, &e, in_data)?)?;
                        }
                    }
                    _ => {
                        if in_metadata && e.local_name().as_ref() == b"properties" {
                            records.push(EntityBuilder::default().finish());
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let Some(f) = field.as_mut() {
                    let text = t
                        .unescape()
                        .map_err(|e| StorageError::decode(format!("bad text: {e}")))?;
                    f.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(f) = field.as_mut() {
                    f.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if let Some(props_depth) = open_props {
                    if depth == props_depth + 1 {
                        if let (Some(f), Some((_, builder))) = (field.take(), entity.as_mut()) {
                            builder.finish_field(f)?;
                        }
                    } else if depth == props_depth {
                        if let Some((_, builder)) = entity.take() {
                            records.push(builder.finish());
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(StorageError::decode("document has no root element"));
    }
    if depth != 0 || entity.is_some() {
        return Err(StorageError::decode("unexpected end of document"));
    }
    Ok(records)
}

fn is_namespace(ns: &ResolveResult<'_>, uri: &str) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(n)) if *n == uri.as_bytes())
}

/// One property element being read.
struct FieldBuilder {
    name: String,
    in_data: bool,
    edm_type: Option<String>,
    text: String,
}

impl FieldBuilder {
    fn start(reader: &NsReader<&[u8]>, e: &BytesStart<'_>, in_data: bool) -> Result<Self, StorageError> {
        let name = std::str::from_utf8(e.local_name().as_ref())
            .map_err(|err| StorageError::decode(format!("bad element name: {err}")))?
            .to_string();

        let mut edm_type = None;
        for attr in e.attributes() {
            let attr = attr.map_err(|err| StorageError::decode(format!("bad attribute: {err}")))?;
            let (ns, local) = reader.resolve_attribute(attr.key);
            if is_namespace(&ns, METADATA_NS) && local.as_ref() == b"type" {
                let value = attr
                    .unescape_value()
                    .map_err(|err| StorageError::decode(format!("bad attribute value: {err}")))?;
                edm_type = Some(value.into_owned());
            }
        }

        Ok(Self {
            name,
            in_data,
            edm_type,
            text: String::new(),
        })
    }
}

#[derive(Default)]
struct EntityBuilder {
    row_key: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    properties: BTreeMap<String, PropertyValue>,
}

impl EntityBuilder {
    fn finish_field(&mut self, field: FieldBuilder) -> Result<(), StorageError> {
        if field.in_data && field.name == ROW_KEY {
            self.row_key = Some(field.text);
        } else if field.in_data && field.name == PARTITION_KEY {
            // Supplied per call on writes; not part of the record.
        } else if field.in_data && field.name == TIMESTAMP {
            self.timestamp = Some(parse_datetime(&field.text)?);
        } else if field.edm_type.as_deref() == Some(EDM_DATETIME) {
            let dt = parse_datetime(&field.text)?;
            self.properties.insert(field.name, PropertyValue::DateTime(dt));
        } else {
            self.properties.insert(field.name, PropertyValue::String(field.text));
        }
        Ok(())
    }

    fn finish(self) -> TableRecord {
        let row_key = match self.row_key {
            Some(key) => key,
            None => {
                tracing::warn!("entity without RowKey, using empty key");
                String::new()
            }
        };
        TableRecord::with_row_key(row_key, self.properties).with_timestamp(self.timestamp)
    }
}
