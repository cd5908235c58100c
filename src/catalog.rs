use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{Arc, Mutex},
};

use crate::{
    db_file::DbFile,
    error::{EngineError, EngineResult},
    heap_file::HeapFile,
    tuple::{FieldDesc, FieldType, TupleDesc},
};

/// The table lookup used by `BufferPool` and `HeapFile`: `table_id ->
/// Arc<dyn DbFile>`. Grounded in the teacher's `Catalog`, but stripped
/// of schema-table persistence and name-based lookup — this engine has
/// no query layer to resolve names for, so tables are addressed by id
/// only.
pub struct Catalog {
    tables: Mutex<HashMap<i32, Arc<dyn DbFile>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_table(&self, table: Arc<dyn DbFile>) {
        self.tables.lock().unwrap().insert(table.table_id(), table);
    }

    pub fn get_table(&self, table_id: i32) -> Option<Arc<dyn DbFile>> {
        self.tables.lock().unwrap().get(&table_id).cloned()
    }

    pub fn tuple_desc(&self, table_id: i32) -> Option<TupleDesc> {
        self.get_table(table_id).map(|t| t.tuple_desc().clone())
    }

    /// Load every table named in a catalog text file (§6): one line per
    /// table, `name(col type [pk], col type, ...)`. Each table's backing
    /// heap file is expected at `<dir>/<name>.dat`, where `<dir>` is the
    /// catalog file's own directory.
    ///
    /// Table ids are assigned in file order, starting at 1, since the
    /// text format carries names, not ids.
    pub fn load_from_file(&self, catalog_path: impl AsRef<Path>, page_size: usize) -> EngineResult<()> {
        let catalog_path = catalog_path.as_ref();
        let dir = catalog_path.parent().unwrap_or_else(|| Path::new("."));
        let text = fs::read_to_string(catalog_path)?;

        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let table_id = (i + 1) as i32;
            let (name, tuple_desc) = parse_catalog_line(line)?;
            let data_path = dir.join(format!("{}.dat", name));
            let heap_file = HeapFile::new(&data_path, table_id, tuple_desc, page_size)?;
            self.add_table(Arc::new(heap_file));
        }
        Ok(())
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one `name(col type [pk], col type, ...)` catalog line.
fn parse_catalog_line(line: &str) -> EngineResult<(String, TupleDesc)> {
    let open = line.find('(').ok_or_else(|| {
        EngineError::BadPermission(format!("malformed catalog line: {}", line))
    })?;
    let close = line.rfind(')').ok_or_else(|| {
        EngineError::BadPermission(format!("malformed catalog line: {}", line))
    })?;
    let name = line[..open].trim().to_string();
    let body = &line[open + 1..close];

    let mut fields = Vec::new();
    let mut primary_key = None;
    for (i, col) in body.split(',').enumerate() {
        let col = col.trim();
        if col.is_empty() {
            continue;
        }
        let mut parts = col.split_whitespace();
        let col_name = parts
            .next()
            .ok_or_else(|| EngineError::BadPermission(format!("malformed column: {}", col)))?
            .to_string();
        let type_name = parts
            .next()
            .ok_or_else(|| EngineError::BadPermission(format!("malformed column: {}", col)))?;
        let field_type = match type_name {
            "int" => FieldType::Int,
            "string" => FieldType::Str(128),
            other => {
                return Err(EngineError::BadPermission(format!(
                    "unknown column type: {}",
                    other
                )))
            }
        };
        if parts.next() == Some("pk") {
            primary_key = Some(i);
        }
        fields.push(FieldDesc {
            name: col_name,
            field_type,
        });
    }

    Ok((name, TupleDesc::new(fields, primary_key)))
}
