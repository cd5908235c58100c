use crate::ids::RecordId;

/// One column's static type. `Str` carries the fixed width every value
/// of that column is padded/truncated to, per §6 of the format this
/// engine targets ("STRING (fixed-width, length-prefixed as specified
/// by the tuple descriptor)").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Int,
    Str(usize),
}

impl FieldType {
    /// On-disk width in bytes: 4 for `Int`, `2 + len` for `Str` (a
    /// `u16` length prefix followed by the fixed-width byte buffer).
    pub fn byte_width(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str(len) => 2 + len,
        }
    }
}

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::Str(s) => FieldType::Str(s.len()),
        }
    }
}

/// One column's name and type, the unit a `TupleDesc` is built from.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDesc {
    pub name: String,
    pub field_type: FieldType,
}

/// A table's row shape: an ordered list of named, typed columns plus
/// which one (if any) is the primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct TupleDesc {
    fields: Vec<FieldDesc>,
    pub primary_key: Option<usize>,
}

impl TupleDesc {
    pub fn new(fields: Vec<FieldDesc>, primary_key: Option<usize>) -> Self {
        Self {
            fields,
            primary_key,
        }
    }

    pub fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Total on-disk width of one tuple of this shape.
    pub fn tuple_size(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.byte_width()).sum()
    }
}

/// A single row. `record_id` is `None` until the tuple has been placed
/// on a page by `HeapFile::insert_tuple`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    pub fields: Vec<Field>,
    pub record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            record_id: None,
        }
    }
}
