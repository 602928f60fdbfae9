//! The generic line codec.
//!
//! [`encode_values`] and [`decode_values`] are the only places that touch
//! wire text. They walk a [`MessageDescriptor`] and convert between a line
//! and a flat list of [`FieldValue`]s. Packet types sit on top through the
//! [`Packet`] trait, which only moves values in and out of a
//! [`FieldWriter`] or [`FieldReader`].
//!
//! Layout rules:
//!
//! - Tokens are separated by exactly one space, so re-encoding a decoded
//!   line reproduces it byte for byte.
//! - Integers are canonical decimal (`-5`, never `+5` or `05`).
//! - Optional fields may only be left off the end of a line.
//! - Tokens beyond the last declared field are ignored.

use crate::{FieldKind, FieldDescriptor, FieldValue, MessageDescriptor, ProtocolError};

/// Separates top-level tokens.
pub const SEPARATOR: char = ' ';
const SEPARATOR_STR: &str = " ";
/// Prefix of a nested packet token.
const PACKET_MARKER: char = '#';
/// Separates the fields of a nested packet token.
const PACKET_SEPARATOR: char = '^';
const LINE_BREAKS: [char; 2] = ['\n', '\r'];

/// A message type with a fixed wire layout.
///
/// Implementors describe their layout once in [`descriptor`](Packet::descriptor)
/// and move their fields through the writer and reader in descriptor order.
/// Records that appear inside lists implement this trait too, with a
/// keyword-less descriptor built by [`MessageDescriptor::sub`].
pub trait Packet: Sized + Send + 'static {
    /// The layout of this packet. Built once, then shared.
    fn descriptor() -> &'static MessageDescriptor;

    /// Pushes every field in descriptor order.
    fn write_fields(&self, w: &mut FieldWriter);

    /// Pulls every field in descriptor order.
    fn read_fields(r: &mut FieldReader) -> Result<Self, ProtocolError>;

    /// The routing keyword.
    fn keyword() -> &'static str {
        Self::descriptor().keyword()
    }
}

/// Encodes a packet into one line, without a terminator.
pub fn encode<P: Packet>(packet: &P) -> Result<String, ProtocolError> {
    encode_values(P::descriptor(), &to_values(packet))
}

/// Decodes one line into a packet.
pub fn decode<P: Packet>(line: &str) -> Result<P, ProtocolError> {
    let values = decode_values(P::descriptor(), line)?;
    from_values(values)
}

/// Flattens a packet into descriptor-ordered values.
pub fn to_values<P: Packet>(packet: &P) -> Vec<FieldValue> {
    let mut writer = FieldWriter::default();
    packet.write_fields(&mut writer);
    writer.values
}

/// Rebuilds a packet from descriptor-ordered values.
pub fn from_values<P: Packet>(values: Vec<FieldValue>) -> Result<P, ProtocolError> {
    let mut reader = FieldReader::new(P::descriptor(), values);
    P::read_fields(&mut reader)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes `values` laid out by `desc` into one line.
pub fn encode_values(
    desc: &MessageDescriptor,
    values: &[FieldValue],
) -> Result<String, ProtocolError> {
    let fields = desc.fields();
    if values.len() != fields.len() {
        let index = values.len().min(fields.len());
        return Err(ProtocolError::InvalidValue {
            index,
            name: fields.get(index).map_or("<extra>", |f| f.name),
            reason: format!("expected {} values, got {}", fields.len(), values.len()),
        });
    }

    let mut tokens = vec![desc.keyword().to_owned()];
    let mut absent = false;
    for (field, value) in fields.iter().zip(values) {
        if let FieldValue::Absent = value {
            if !field.optional {
                return Err(ProtocolError::MissingField {
                    index: field.index,
                    name: field.name,
                });
            }
            absent = true;
            continue;
        }
        if absent {
            return Err(invalid(field, "value follows an absent optional field"));
        }
        encode_field(field, value, &mut tokens)?;
    }
    Ok(tokens.join(SEPARATOR_STR))
}

fn encode_field(
    field: &FieldDescriptor,
    value: &FieldValue,
    tokens: &mut Vec<String>,
) -> Result<(), ProtocolError> {
    match (&field.kind, value) {
        (FieldKind::Text, FieldValue::Text(text)) => {
            if text.contains(LINE_BREAKS) {
                return Err(invalid(field, "text contains a line break"));
            }
            tokens.push(text.clone());
        }
        (
            FieldKind::List {
                separator,
                element,
                counted,
            },
            FieldValue::List(records),
        ) => {
            if *counted {
                tokens.push(records.len().to_string());
            }
            for record in records {
                let parts = encode_parts(element, record, *separator)
                    .map_err(|reason| invalid(field, reason))?;
                let mut token = String::new();
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        token.push(*separator);
                    }
                    token.push_str(part);
                }
                tokens.push(token);
            }
        }
        (FieldKind::Packet(nested), FieldValue::Packet(values)) => {
            let mut token = String::new();
            token.push(PACKET_MARKER);
            token.push_str(nested.keyword());
            let parts = encode_parts(nested, values, PACKET_SEPARATOR)
                .map_err(|reason| invalid(field, reason))?;
            for part in parts {
                token.push(PACKET_SEPARATOR);
                token.push_str(&part);
            }
            tokens.push(token);
        }
        (kind, value) if kind.is_scalar() => {
            let token =
                encode_scalar(kind, value, None).map_err(|reason| invalid(field, reason))?;
            tokens.push(token);
        }
        (_, value) => {
            return Err(invalid(field, format!("unexpected {} value", value.shape())));
        }
    }
    Ok(())
}

/// Encodes the scalar fields of a list record or nested packet.
fn encode_parts(
    desc: &MessageDescriptor,
    values: &[FieldValue],
    separator: char,
) -> Result<Vec<String>, String> {
    if values.len() != desc.fields().len() {
        return Err(format!(
            "expected {} parts, got {}",
            desc.fields().len(),
            values.len()
        ));
    }
    let mut parts = Vec::with_capacity(values.len());
    let mut absent = false;
    for (field, value) in desc.fields().iter().zip(values) {
        match value {
            FieldValue::Absent if field.optional => absent = true,
            FieldValue::Absent => return Err(format!("`{}` is required", field.name)),
            _ if absent => return Err(format!("`{}` follows an absent part", field.name)),
            _ => parts.push(
                encode_scalar(&field.kind, value, Some(separator))
                    .map_err(|reason| format!("`{}`: {reason}", field.name))?,
            ),
        }
    }
    Ok(parts)
}

fn encode_scalar(
    kind: &FieldKind,
    value: &FieldValue,
    separator: Option<char>,
) -> Result<String, String> {
    match (*kind, value) {
        (FieldKind::Bool, FieldValue::Bool(b)) => Ok(if *b { "1" } else { "0" }.to_owned()),
        (FieldKind::Int { min, max }, FieldValue::Int(n)) => {
            check_range(*n, min, max)?;
            Ok(n.to_string())
        }
        (FieldKind::Str, FieldValue::Str(s)) => {
            check_str(s, separator)?;
            Ok(s.clone())
        }
        (_, value) => Err(format!("unexpected {} value", value.shape())),
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes one line laid out by `desc` into values.
pub fn decode_values(
    desc: &MessageDescriptor,
    line: &str,
) -> Result<Vec<FieldValue>, ProtocolError> {
    let line = line.trim_end_matches(LINE_BREAKS);
    // Trailing blanks only carry meaning inside free text.
    let line = if desc.ends_with_text() {
        line
    } else {
        line.trim_end_matches(SEPARATOR)
    };

    let mut tokens = line.split(SEPARATOR);
    let keyword = tokens.next().unwrap_or_default();
    if keyword != desc.keyword() {
        return Err(ProtocolError::KeywordMismatch {
            expected: desc.keyword(),
            found: keyword.to_owned(),
        });
    }
    let rest: Vec<&str> = tokens.collect();

    let mut cursor = 0;
    let mut values = Vec::with_capacity(desc.fields().len());
    for field in desc.fields() {
        let value = match field.kind {
            FieldKind::Text => {
                if cursor == rest.len() {
                    absent_or_missing(field)?
                } else {
                    let text = rest[cursor..].join(SEPARATOR_STR);
                    cursor = rest.len();
                    FieldValue::Text(text)
                }
            }
            FieldKind::List {
                separator,
                element,
                counted: false,
            } => {
                let records = rest[cursor..]
                    .iter()
                    .map(|token| decode_record(field, element, separator, token))
                    .collect::<Result<Vec<_>, _>>()?;
                cursor = rest.len();
                FieldValue::List(records)
            }
            FieldKind::List {
                separator,
                element,
                counted: true,
            } => {
                let Some(token) = rest.get(cursor) else {
                    values.push(absent_or_missing(field)?);
                    continue;
                };
                cursor += 1;
                let count = parse_count(token).map_err(|reason| rejected(field, token, reason))?;
                if count > rest.len() - cursor {
                    return Err(ProtocolError::MissingField {
                        index: field.index,
                        name: field.name,
                    });
                }
                let records = rest[cursor..cursor + count]
                    .iter()
                    .map(|token| decode_record(field, element, separator, token))
                    .collect::<Result<Vec<_>, _>>()?;
                cursor += count;
                FieldValue::List(records)
            }
            FieldKind::Packet(nested) => match rest.get(cursor) {
                None => absent_or_missing(field)?,
                Some(token) => {
                    cursor += 1;
                    decode_nested(field, nested, token)?
                }
            },
            kind => match rest.get(cursor) {
                None => absent_or_missing(field)?,
                Some(token) => {
                    cursor += 1;
                    parse_scalar(&kind, token, None).map_err(|reason| rejected(field, token, reason))?
                }
            },
        };
        values.push(value);
    }
    Ok(values)
}

fn decode_record(
    field: &FieldDescriptor,
    element: &MessageDescriptor,
    separator: char,
    token: &str,
) -> Result<Vec<FieldValue>, ProtocolError> {
    let parts: Vec<&str> = token.split(separator).collect();
    decode_parts(field, element, &parts, separator, token)
}

fn decode_nested(
    field: &FieldDescriptor,
    nested: &MessageDescriptor,
    token: &str,
) -> Result<FieldValue, ProtocolError> {
    let body = token
        .strip_prefix(PACKET_MARKER)
        .ok_or_else(|| rejected(field, token, "expected a nested packet"))?;
    let mut parts = body.split(PACKET_SEPARATOR);
    if parts.next() != Some(nested.keyword()) {
        return Err(rejected(
            field,
            token,
            format!("expected nested `{}`", nested.keyword()),
        ));
    }
    let parts: Vec<&str> = parts.collect();
    decode_parts(field, nested, &parts, PACKET_SEPARATOR, token).map(FieldValue::Packet)
}

fn decode_parts(
    field: &FieldDescriptor,
    desc: &MessageDescriptor,
    parts: &[&str],
    separator: char,
    token: &str,
) -> Result<Vec<FieldValue>, ProtocolError> {
    if parts.len() > desc.fields().len() {
        return Err(rejected(
            field,
            token,
            format!("expected at most {} parts", desc.fields().len()),
        ));
    }
    desc.fields()
        .iter()
        .map(|sub| match parts.get(sub.index) {
            Some(part) => parse_scalar(&sub.kind, part, Some(separator))
                .map_err(|reason| rejected(field, token, format!("`{}`: {reason}", sub.name))),
            None if sub.optional => Ok(FieldValue::Absent),
            None => Err(ProtocolError::MissingField {
                index: field.index,
                name: sub.name,
            }),
        })
        .collect()
}

fn parse_scalar(
    kind: &FieldKind,
    token: &str,
    separator: Option<char>,
) -> Result<FieldValue, String> {
    match *kind {
        FieldKind::Bool => match token {
            "0" => Ok(FieldValue::Bool(false)),
            "1" => Ok(FieldValue::Bool(true)),
            _ => Err("expected 0 or 1".to_owned()),
        },
        FieldKind::Int { min, max } => {
            let n = parse_int(token)?;
            check_range(n, min, max)?;
            Ok(FieldValue::Int(n))
        }
        FieldKind::Str => {
            check_str(token, separator)?;
            Ok(FieldValue::Str(token.to_owned()))
        }
        _ => Err("not a single-token field".to_owned()),
    }
}

fn parse_int(token: &str) -> Result<i64, String> {
    let n: i64 = token.parse().map_err(|_| "not an integer".to_owned())?;
    if n.to_string() != token {
        return Err("integer is not in canonical form".to_owned());
    }
    Ok(n)
}

fn parse_count(token: &str) -> Result<usize, String> {
    let n = parse_int(token)?;
    usize::try_from(n).map_err(|_| "negative length".to_owned())
}

// ---------------------------------------------------------------------------
// Shared checks
// ---------------------------------------------------------------------------

fn check_range(n: i64, min: i64, max: i64) -> Result<(), String> {
    if n < min || n > max {
        return Err(format!("{n} is outside {min}..={max}"));
    }
    Ok(())
}

fn check_str(s: &str, separator: Option<char>) -> Result<(), String> {
    if s.is_empty() {
        return Err("empty token".to_owned());
    }
    if s.contains(char::is_whitespace) || separator.is_some_and(|sep| s.contains(sep)) {
        return Err("token contains a separator".to_owned());
    }
    Ok(())
}

fn absent_or_missing(field: &FieldDescriptor) -> Result<FieldValue, ProtocolError> {
    if field.optional {
        Ok(FieldValue::Absent)
    } else {
        Err(ProtocolError::MissingField {
            index: field.index,
            name: field.name,
        })
    }
}

fn rejected(field: &FieldDescriptor, token: &str, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::FieldValidation {
        index: field.index,
        token: token.to_owned(),
        reason: reason.into(),
    }
}

fn invalid(field: &FieldDescriptor, reason: impl Into<String>) -> ProtocolError {
    ProtocolError::InvalidValue {
        index: field.index,
        name: field.name,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Typed access for packet implementations
// ---------------------------------------------------------------------------

/// Collects field values in descriptor order.
#[derive(Debug, Default)]
pub struct FieldWriter {
    values: Vec<FieldValue>,
}

impl FieldWriter {
    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.values.push(FieldValue::Bool(value));
        self
    }

    pub fn int(&mut self, value: impl Into<i64>) -> &mut Self {
        self.values.push(FieldValue::Int(value.into()));
        self
    }

    pub fn opt_int(&mut self, value: Option<impl Into<i64>>) -> &mut Self {
        self.values
            .push(value.map_or(FieldValue::Absent, |v| FieldValue::Int(v.into())));
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.values.push(FieldValue::Str(value.to_owned()));
        self
    }

    pub fn opt_string(&mut self, value: Option<&str>) -> &mut Self {
        self.values
            .push(value.map_or(FieldValue::Absent, |v| FieldValue::Str(v.to_owned())));
        self
    }

    pub fn text(&mut self, value: &str) -> &mut Self {
        self.values.push(FieldValue::Text(value.to_owned()));
        self
    }

    pub fn opt_text(&mut self, value: Option<&str>) -> &mut Self {
        self.values
            .push(value.map_or(FieldValue::Absent, |v| FieldValue::Text(v.to_owned())));
        self
    }

    pub fn list<T: Packet>(&mut self, records: &[T]) -> &mut Self {
        self.values
            .push(FieldValue::List(records.iter().map(to_values).collect()));
        self
    }

    pub fn packet<T: Packet>(&mut self, packet: &T) -> &mut Self {
        self.values.push(FieldValue::Packet(to_values(packet)));
        self
    }
}

/// Hands decoded values back to a packet in descriptor order.
#[derive(Debug)]
pub struct FieldReader {
    desc: &'static MessageDescriptor,
    values: std::vec::IntoIter<FieldValue>,
    index: usize,
}

impl FieldReader {
    pub fn new(desc: &'static MessageDescriptor, values: Vec<FieldValue>) -> Self {
        Self {
            desc,
            values: values.into_iter(),
            index: 0,
        }
    }

    fn next(&mut self) -> Result<(usize, &'static str, FieldValue), ProtocolError> {
        let index = self.index;
        let name = self.desc.fields().get(index).map_or("<extra>", |f| f.name);
        let value = self
            .values
            .next()
            .ok_or(ProtocolError::MissingField { index, name })?;
        self.index += 1;
        Ok((index, name, value))
    }

    fn mismatch(index: usize, name: &'static str, expected: &str, found: &FieldValue) -> ProtocolError {
        ProtocolError::InvalidValue {
            index,
            name,
            reason: format!("expected {expected}, found {}", found.shape()),
        }
    }

    fn convert<T: TryFrom<i64>>(index: usize, n: i64) -> Result<T, ProtocolError> {
        T::try_from(n).map_err(|_| ProtocolError::FieldValidation {
            index,
            token: n.to_string(),
            reason: "value is not accepted here".to_owned(),
        })
    }

    pub fn bool(&mut self) -> Result<bool, ProtocolError> {
        match self.next()? {
            (_, _, FieldValue::Bool(b)) => Ok(b),
            (index, name, other) => Err(Self::mismatch(index, name, "bool", &other)),
        }
    }

    /// Reads an integer into any type convertible from `i64`, including
    /// wire enums and id newtypes.
    pub fn int<T: TryFrom<i64>>(&mut self) -> Result<T, ProtocolError> {
        match self.next()? {
            (index, _, FieldValue::Int(n)) => Self::convert(index, n),
            (index, name, other) => Err(Self::mismatch(index, name, "int", &other)),
        }
    }

    pub fn opt_int<T: TryFrom<i64>>(&mut self) -> Result<Option<T>, ProtocolError> {
        match self.next()? {
            (_, _, FieldValue::Absent) => Ok(None),
            (index, _, FieldValue::Int(n)) => Self::convert(index, n).map(Some),
            (index, name, other) => Err(Self::mismatch(index, name, "int", &other)),
        }
    }

    pub fn string(&mut self) -> Result<String, ProtocolError> {
        match self.next()? {
            (_, _, FieldValue::Str(s)) => Ok(s),
            (index, name, other) => Err(Self::mismatch(index, name, "string", &other)),
        }
    }

    pub fn opt_string(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.next()? {
            (_, _, FieldValue::Absent) => Ok(None),
            (_, _, FieldValue::Str(s)) => Ok(Some(s)),
            (index, name, other) => Err(Self::mismatch(index, name, "string", &other)),
        }
    }

    pub fn text(&mut self) -> Result<String, ProtocolError> {
        match self.next()? {
            (_, _, FieldValue::Text(s)) => Ok(s),
            (index, name, other) => Err(Self::mismatch(index, name, "text", &other)),
        }
    }

    pub fn opt_text(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.next()? {
            (_, _, FieldValue::Absent) => Ok(None),
            (_, _, FieldValue::Text(s)) => Ok(Some(s)),
            (index, name, other) => Err(Self::mismatch(index, name, "text", &other)),
        }
    }

    pub fn list<T: Packet>(&mut self) -> Result<Vec<T>, ProtocolError> {
        match self.next()? {
            (_, _, FieldValue::List(records)) => records.into_iter().map(from_values).collect(),
            (index, name, other) => Err(Self::mismatch(index, name, "list", &other)),
        }
    }

    pub fn packet<T: Packet>(&mut self) -> Result<T, ProtocolError> {
        match self.next()? {
            (_, _, FieldValue::Packet(values)) => from_values(values),
            (index, name, other) => Err(Self::mismatch(index, name, "packet", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ExchangeOfferItem, ExchangeOfferPacket, RequestExchangePacket, WalkPacket};
    use crate::server::{DlgPacket, IvnItem, IvnPacket, SayPacket};
    use crate::{PocketType, RequestExchangeType, SayColorType, VisualId, VisualType};

    // =====================================================================
    // Scalars
    // =====================================================================

    #[test]
    fn test_decode_walk_with_optional_speed() {
        let walk: WalkPacket = decode("walk 12 -3 5").unwrap();
        assert_eq!(walk, WalkPacket { x: 12, y: -3, speed: Some(5) });

        let walk: WalkPacket = decode("walk 12 -3").unwrap();
        assert_eq!(walk.speed, None);
        assert_eq!(encode(&walk).unwrap(), "walk 12 -3");
    }

    #[test]
    fn test_decode_missing_required_field_reports_index() {
        let err = decode::<WalkPacket>("walk 12").unwrap_err();
        assert_eq!(err, ProtocolError::MissingField { index: 1, name: "y" });
    }

    #[test]
    fn test_decode_out_of_range_reports_index_and_token() {
        let err = decode::<WalkPacket>("walk 12 40000").unwrap_err();
        match err {
            ProtocolError::FieldValidation { index, token, .. } => {
                assert_eq!(index, 1);
                assert_eq!(token, "40000");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_non_canonical_integer_rejected() {
        for line in ["walk 012 3", "walk +12 3", "walk -0 3", "walk x 3"] {
            let err = decode::<WalkPacket>(line).unwrap_err();
            assert!(
                matches!(err, ProtocolError::FieldValidation { index: 0, .. }),
                "{line}: {err:?}"
            );
        }
    }

    #[test]
    fn test_decode_ignores_extra_tokens_and_trailing_blanks() {
        let walk: WalkPacket = decode("walk 1 2 3 99 junk").unwrap();
        assert_eq!(walk, WalkPacket { x: 1, y: 2, speed: Some(3) });

        let walk: WalkPacket = decode("walk 1 2 ").unwrap();
        assert_eq!(walk.speed, None);
    }

    #[test]
    fn test_decode_keyword_mismatch() {
        let err = decode::<WalkPacket>("preq").unwrap_err();
        assert!(matches!(err, ProtocolError::KeywordMismatch { expected: "walk", .. }));
    }

    // =====================================================================
    // Text
    // =====================================================================

    #[test]
    fn test_text_keeps_spaces_byte_for_byte() {
        let line = "say 1 42 10 hello  there friend ";
        let say: SayPacket = decode(line).unwrap();
        assert_eq!(say.message, "hello  there friend ");
        assert_eq!(say.color, SayColorType::Yellow);
        assert_eq!(encode(&say).unwrap(), line);
    }

    #[test]
    fn test_encode_rejects_line_break_in_text() {
        let say = SayPacket {
            visual_type: VisualType::Player,
            visual_id: VisualId(1),
            color: SayColorType::White,
            message: "a\nb".into(),
        };
        assert!(matches!(encode(&say), Err(ProtocolError::InvalidValue { index: 3, .. })));
    }

    // =====================================================================
    // Lists
    // =====================================================================

    #[test]
    fn test_uncounted_list_consumes_remaining_tokens() {
        let line = "exc_list 100 0 1.3.5 0.7.1";
        let offer: ExchangeOfferPacket = decode(line).unwrap();
        assert_eq!(offer.gold, 100);
        assert_eq!(
            offer.items,
            vec![
                ExchangeOfferItem { pocket: PocketType::Main, slot: 3, amount: 5 },
                ExchangeOfferItem { pocket: PocketType::Equipment, slot: 7, amount: 1 },
            ]
        );
        assert_eq!(encode(&offer).unwrap(), line);

        let empty: ExchangeOfferPacket = decode("exc_list 0 0").unwrap();
        assert!(empty.items.is_empty());
        assert_eq!(encode(&empty).unwrap(), "exc_list 0 0");
    }

    #[test]
    fn test_list_record_with_wrong_part_count_rejected() {
        let err = decode::<ExchangeOfferPacket>("exc_list 0 0 1.3").unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField { index: 2, name: "amount" }));

        let err = decode::<ExchangeOfferPacket>("exc_list 0 0 1.3.5.9").unwrap_err();
        assert!(matches!(err, ProtocolError::FieldValidation { index: 2, .. }));
    }

    #[test]
    fn test_counted_list_stops_at_count() {
        let ivn: IvnPacket = decode("ivn 1 2 0.1012.3 4.2000.1 ignored").unwrap();
        assert_eq!(ivn.items.len(), 2);
        assert_eq!(ivn.items[1], IvnItem { slot: 4, vnum: 2000, amount: 1 });

        let err = decode::<IvnPacket>("ivn 1 3 0.1012.3").unwrap_err();
        assert!(matches!(err, ProtocolError::MissingField { index: 1, .. }));

        let err = decode::<IvnPacket>("ivn 1 -1").unwrap_err();
        assert!(matches!(err, ProtocolError::FieldValidation { index: 1, .. }));
    }

    // =====================================================================
    // Nested packets
    // =====================================================================

    #[test]
    fn test_nested_packets_round_trip() {
        let dlg = DlgPacket {
            yes: RequestExchangePacket {
                request_type: RequestExchangeType::List,
                visual_id: Some(VisualId(7)),
            },
            no: RequestExchangePacket {
                request_type: RequestExchangeType::Declined,
                visual_id: Some(VisualId(7)),
            },
            question: "Do you want to trade?".into(),
        };
        let line = encode(&dlg).unwrap();
        assert_eq!(line, "dlg #req_exc^2^7 #req_exc^5^7 Do you want to trade?");
        assert_eq!(decode::<DlgPacket>(&line).unwrap(), dlg);
    }

    #[test]
    fn test_nested_packet_with_wrong_keyword_rejected() {
        let err = decode::<DlgPacket>("dlg #walk^2^7 #req_exc^5^7 q").unwrap_err();
        assert!(matches!(err, ProtocolError::FieldValidation { index: 0, .. }));
        let err = decode::<DlgPacket>("dlg req_exc^2^7 #req_exc^5^7 q").unwrap_err();
        assert!(matches!(err, ProtocolError::FieldValidation { index: 0, .. }));
    }

    #[test]
    fn test_decode_unknown_enum_value_rejected() {
        // 3 is inside the declared range of `pocket` but names no pocket.
        let err = decode::<ExchangeOfferPacket>("exc_list 0 0 3.1.1").unwrap_err();
        assert!(matches!(err, ProtocolError::FieldValidation { .. }), "{err:?}");
    }

    // =====================================================================
    // Value-level rules
    // =====================================================================

    #[test]
    fn test_encode_values_rejects_value_after_absent() {
        let desc = WalkPacket::descriptor();
        let values = [FieldValue::Int(1), FieldValue::Absent, FieldValue::Int(3)];
        assert!(matches!(
            encode_values(desc, &values),
            Err(ProtocolError::MissingField { index: 1, .. })
        ));

        let desc = RequestExchangePacket::descriptor();
        let values = [FieldValue::Absent, FieldValue::Int(3)];
        assert!(encode_values(desc, &values).is_err());
    }

    #[test]
    fn test_encode_values_rejects_separator_inside_string() {
        use crate::server::{BlinitItem, BlinitPacket};
        let packet = BlinitPacket {
            blocked: vec![BlinitItem { character_id: VisualId(1), name: "a|b".into() }],
        };
        assert!(matches!(encode(&packet), Err(ProtocolError::InvalidValue { index: 0, .. })));

        let packet = BlinitPacket {
            blocked: vec![BlinitItem { character_id: VisualId(1), name: "a b".into() }],
        };
        assert!(encode(&packet).is_err());
    }

    #[test]
    fn test_encode_values_rejects_wrong_arity_and_shape() {
        let desc = WalkPacket::descriptor();
        assert!(encode_values(desc, &[FieldValue::Int(1)]).is_err());
        let values = [FieldValue::Str("1".into()), FieldValue::Int(1), FieldValue::Absent];
        assert!(matches!(
            encode_values(desc, &values),
            Err(ProtocolError::InvalidValue { index: 0, .. })
        ));
    }
}
