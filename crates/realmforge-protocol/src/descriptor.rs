//! Field-layout descriptors.
//!
//! Every packet type owns one immutable [`MessageDescriptor`]: its keyword,
//! the ordered list of fields that follow it, and the session precondition
//! the dispatcher enforces before a handler runs. The codec is a single
//! generic routine that walks a descriptor; packet types never parse text
//! themselves.
//!
//! ```text
//! walk 12 40 5
//! ^^^^ ^^ ^^ ^
//! |    |  |  field 2: speed  Int 0..=255 (optional)
//! |    |  field 1: y         Int
//! |    field 0: x            Int
//! keyword
//! ```

use crate::Packet;

/// What the dispatcher requires of a session before a message is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Requirement {
    /// Accepted on any connection (the handshake itself).
    #[default]
    None,
    /// The session has completed the handshake.
    Authenticated,
    /// The session has a character attached and placed in the world.
    InGame,
}

/// How one field is laid out on the wire.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// `0` or `1`.
    Bool,
    /// A canonical decimal integer within `min..=max`.
    Int { min: i64, max: i64 },
    /// A single non-empty token.
    Str,
    /// The rest of the line, spaces included. Only valid as the last field.
    Text,
    /// A sequence of sub-records, one token each, whose fields are joined
    /// by `separator`. A counted list is prefixed by its length; an
    /// uncounted list consumes every remaining token and must come last.
    List {
        separator: char,
        element: &'static MessageDescriptor,
        counted: bool,
    },
    /// A whole packet nested in one token: `#keyword^field^field`.
    Packet(&'static MessageDescriptor),
}

impl FieldKind {
    pub const U8: FieldKind = FieldKind::int(0, u8::MAX as i64);
    pub const I16: FieldKind = FieldKind::int(i16::MIN as i64, i16::MAX as i64);
    pub const I32: FieldKind = FieldKind::int(i32::MIN as i64, i32::MAX as i64);
    pub const U32: FieldKind = FieldKind::int(0, u32::MAX as i64);
    pub const I64: FieldKind = FieldKind::int(i64::MIN, i64::MAX);
    pub const NON_NEGATIVE: FieldKind = FieldKind::int(0, i64::MAX);

    /// An integer restricted to `min..=max`.
    pub const fn int(min: i64, max: i64) -> Self {
        FieldKind::Int { min, max }
    }

    /// An uncounted list of `T` records.
    pub fn list<T: Packet>(separator: char) -> Self {
        FieldKind::List {
            separator,
            element: T::descriptor(),
            counted: false,
        }
    }

    /// A length-prefixed list of `T` records.
    pub fn counted_list<T: Packet>(separator: char) -> Self {
        FieldKind::List {
            separator,
            element: T::descriptor(),
            counted: true,
        }
    }

    /// A nested `T` packet.
    pub fn packet<T: Packet>() -> Self {
        FieldKind::Packet(T::descriptor())
    }

    pub(crate) fn is_scalar(&self) -> bool {
        matches!(self, FieldKind::Bool | FieldKind::Int { .. } | FieldKind::Str)
    }

    fn consumes_rest(&self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::List { counted: false, .. }
        )
    }
}

/// One positioned field of a message.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// Position after the keyword, starting at 0.
    pub index: usize,
    pub name: &'static str,
    pub kind: FieldKind,
    /// Optional fields may be left off the end of a line.
    pub optional: bool,
}

/// The immutable layout of one message type.
#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    keyword: &'static str,
    fields: Vec<FieldDescriptor>,
    requirement: Requirement,
}

impl MessageDescriptor {
    /// Starts a top-level descriptor for `keyword`.
    pub fn new(keyword: &'static str) -> Self {
        Self {
            keyword,
            fields: Vec::new(),
            requirement: Requirement::None,
        }
    }

    /// Starts a keyword-less descriptor for records inside a list.
    pub fn sub() -> Self {
        Self::new("")
    }

    /// Appends a required field.
    pub fn field(mut self, name: &'static str, kind: FieldKind) -> Self {
        self.push(name, kind, false);
        self
    }

    /// Appends an optional field.
    pub fn optional(mut self, name: &'static str, kind: FieldKind) -> Self {
        self.push(name, kind, true);
        self
    }

    /// Sets the session precondition.
    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirement = requirement;
        self
    }

    fn push(&mut self, name: &'static str, kind: FieldKind, optional: bool) {
        self.fields.push(FieldDescriptor {
            index: self.fields.len(),
            name,
            kind,
            optional,
        });
    }

    pub fn keyword(&self) -> &'static str {
        self.keyword
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn requirement(&self) -> Requirement {
        self.requirement
    }

    /// Whether the last field swallows the rest of the line verbatim.
    pub(crate) fn ends_with_text(&self) -> bool {
        matches!(
            self.fields.last(),
            Some(FieldDescriptor {
                kind: FieldKind::Text,
                ..
            })
        )
    }

    /// Checks the layout rules the codec relies on.
    ///
    /// Run once per descriptor when it is registered.
    pub fn validate(&self) -> Result<(), String> {
        if self.keyword.is_empty() || self.keyword.contains(char::is_whitespace) {
            return Err(format!("keyword `{}` is not a single token", self.keyword));
        }
        validate_fields(&self.fields)
    }
}

fn validate_fields(fields: &[FieldDescriptor]) -> Result<(), String> {
    let last = fields.len().saturating_sub(1);
    let mut seen_optional = false;

    for field in fields {
        if field.kind.consumes_rest() && field.index != last {
            return Err(format!("`{}` consumes the rest of the line but is not last", field.name));
        }
        if seen_optional && !field.optional {
            return Err(format!("required field `{}` follows an optional one", field.name));
        }
        seen_optional |= field.optional;

        match field.kind {
            FieldKind::Int { min, max } if min > max => {
                return Err(format!("`{}` has an empty range", field.name));
            }
            FieldKind::List {
                separator,
                element,
                counted,
            } => {
                if !counted && field.optional {
                    return Err(format!("uncounted list `{}` cannot be optional", field.name));
                }
                validate_separator(separator)?;
                validate_element(field.name, element)?;
            }
            FieldKind::Packet(nested) => {
                nested.validate()?;
                if !nested.fields.iter().all(|f| f.kind.is_scalar()) {
                    return Err(format!("nested packet `{}` must hold scalars only", nested.keyword));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_separator(separator: char) -> Result<(), String> {
    if separator.is_whitespace()
        || separator.is_ascii_alphanumeric()
        || matches!(separator, '-' | '#' | '^')
    {
        return Err(format!("`{separator}` cannot separate list fields"));
    }
    Ok(())
}

fn validate_element(list: &str, element: &MessageDescriptor) -> Result<(), String> {
    if !element.keyword.is_empty() {
        return Err(format!("elements of `{list}` must use a keyword-less descriptor"));
    }
    if element.fields.is_empty() {
        return Err(format!("elements of `{list}` have no fields"));
    }
    if element.fields.iter().any(|f| !f.kind.is_scalar() || f.optional) {
        return Err(format!("elements of `{list}` must hold required scalars only"));
    }
    Ok(())
}
