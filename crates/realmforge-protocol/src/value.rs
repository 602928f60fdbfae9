/// A decoded field, shaped by its [`FieldKind`](crate::FieldKind).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// An optional field left off the end of the line.
    Absent,
    Bool(bool),
    Int(i64),
    Str(String),
    Text(String),
    /// One inner vector per record, holding that record's field values.
    List(Vec<Vec<FieldValue>>),
    /// The field values of a nested packet.
    Packet(Vec<FieldValue>),
}

impl FieldValue {
    pub(crate) fn shape(&self) -> &'static str {
        match self {
            FieldValue::Absent => "absent",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Str(_) => "string",
            FieldValue::Text(_) => "text",
            FieldValue::List(_) => "list",
            FieldValue::Packet(_) => "packet",
        }
    }
}
