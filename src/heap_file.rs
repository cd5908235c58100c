use std::{
    convert::TryInto,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
    sync::Mutex,
};

use crate::{
    buffer_pool::BufferPool,
    db_file::DbFile,
    error::{EngineError, EngineResult},
    ids::{PageId, RecordId, TransactionId},
    page::{Page, PagePodExt},
    permission::Permission,
    tuple::{Field, FieldType, Tuple, TupleDesc},
};

/// A table's on-disk heap file: pages of fixed size `page_size`,
/// concatenated back to back, each laid out as a slot-bitmap header
/// followed by `num_slots` fixed-width tuple slots (§6).
///
/// This is the one concrete `DbFile` this engine ships, included so
/// the lock table and buffer pool can be driven end to end against
/// real files; it intentionally does not grow a query layer on top.
pub struct HeapFile {
    table_id: i32,
    tuple_desc: TupleDesc,
    page_size: usize,
    file: Mutex<File>,
}

impl HeapFile {
    pub fn new(
        path: impl AsRef<Path>,
        table_id: i32,
        tuple_desc: TupleDesc,
        page_size: usize,
    ) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            table_id,
            tuple_desc,
            page_size,
            file: Mutex::new(file),
        })
    }

    fn tuple_size(&self) -> usize {
        self.tuple_desc.tuple_size()
    }

    /// `num_slots = floor((P*8) / (tuple_size*8 + 1))` — one header bit
    /// per slot plus the slot's own bytes.
    fn num_slots(&self) -> usize {
        let tuple_bits = self.tuple_size() * 8;
        (self.page_size * 8) / (tuple_bits + 1)
    }

    fn header_bytes(&self) -> usize {
        (self.num_slots() + 7) / 8
    }

    fn is_slot_used(&self, data: &[u8], slot: usize) -> bool {
        let byte = slot / 8;
        let bit = slot % 8;
        (data[byte] >> bit) & 1 == 1
    }

    fn set_slot_used(&self, data: &mut [u8], slot: usize, used: bool) {
        let byte = slot / 8;
        let bit = slot % 8;
        if used {
            data[byte] |= 1 << bit;
        } else {
            data[byte] &= !(1 << bit);
        }
    }

    fn encode_tuple(&self, tuple: &Tuple) -> EngineResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.tuple_size());
        for (field, desc) in tuple.fields.iter().zip(self.tuple_desc.fields()) {
            match (field, desc.field_type) {
                (Field::Int(v), FieldType::Int) => buf.extend_from_slice(&v.to_be_bytes()),
                (Field::Str(s), FieldType::Str(len)) => {
                    let bytes = s.as_bytes();
                    let n = bytes.len().min(len);
                    buf.extend_from_slice(&(n as u16).to_be_bytes());
                    let mut padded = vec![0u8; len];
                    padded[..n].copy_from_slice(&bytes[..n]);
                    buf.extend_from_slice(&padded);
                }
                _ => {
                    return Err(EngineError::BadPermission(
                        "tuple field type does not match table schema".into(),
                    ))
                }
            }
        }
        Ok(buf)
    }

    fn decode_tuple(&self, bytes: &[u8]) -> EngineResult<Tuple> {
        let mut fields = Vec::with_capacity(self.tuple_desc.num_fields());
        let mut offset = 0usize;
        for desc in self.tuple_desc.fields() {
            match desc.field_type {
                FieldType::Int => {
                    let raw: [u8; 4] = bytes[offset..offset + 4].try_into().unwrap();
                    fields.push(Field::Int(i32::from_be_bytes(raw)));
                    offset += 4;
                }
                FieldType::Str(len) => {
                    let raw: [u8; 2] = bytes[offset..offset + 2].try_into().unwrap();
                    let n = u16::from_be_bytes(raw) as usize;
                    offset += 2;
                    let s = String::from_utf8_lossy(&bytes[offset..offset + n]).into_owned();
                    fields.push(Field::Str(s));
                    offset += len;
                }
            }
        }
        Ok(Tuple::new(fields))
    }

    fn read_raw_page(&self, page_number: usize) -> EngineResult<Vec<u8>> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((page_number * self.page_size) as u64))?;
        let mut buf = vec![0u8; self.page_size];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_raw_page(&self, page_number: usize, data: &[u8]) -> EngineResult<()> {
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start((page_number * self.page_size) as u64))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    fn grow_by_one_page(&self) -> EngineResult<usize> {
        let mut file = self.file.lock().unwrap();
        let len = file.metadata()?.len();
        let new_page_number = (len as usize) / self.page_size;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&vec![0u8; self.page_size])?;
        file.flush()?;
        Ok(new_page_number)
    }
}

impl DbFile for HeapFile {
    fn table_id(&self) -> i32 {
        self.table_id
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.tuple_desc
    }

    fn read_page(&self, pid: PageId) -> EngineResult<Page> {
        if pid.table_id != self.table_id {
            return Err(EngineError::BadPageId(format!(
                "{} does not belong to table {}",
                pid, self.table_id
            )));
        }
        if pid.page_number >= self.num_pages() {
            return Err(EngineError::BadPageId(format!("{} does not exist", pid)));
        }
        let bytes = self.read_raw_page(pid.page_number)?;
        Ok(Page::new(pid, bytes))
    }

    fn write_page(&self, page: &Page) -> EngineResult<()> {
        self.write_raw_page(page.id().page_number, page.data())
    }

    fn num_pages(&self) -> usize {
        let file = self.file.lock().unwrap();
        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        (len as usize) / self.page_size
    }

    fn insert_tuple(
        &self,
        buffer_pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> EngineResult<Vec<PageId>> {
        let num_slots = self.num_slots();
        let header_bytes = self.header_bytes();
        let tuple_size = self.tuple_size();
        let encoded = self.encode_tuple(&tuple)?;

        for page_number in 0..self.num_pages() {
            let pid = PageId::new(self.table_id, page_number);
            let page_pod = buffer_pool.get_page(tid, pid, Permission::ReadWrite)?;
            let mut page = page_pod.wl();
            let free_slot = (0..num_slots).find(|&s| !self.is_slot_used(page.data(), s));
            if let Some(slot) = free_slot {
                let data = page.data_mut();
                self.set_slot_used(data, slot, true);
                let off = header_bytes + slot * tuple_size;
                data[off..off + tuple_size].copy_from_slice(&encoded);
                return Ok(vec![pid]);
            }
        }

        let new_page_number = self.grow_by_one_page()?;
        let pid = PageId::new(self.table_id, new_page_number);
        let page_pod = buffer_pool.get_page(tid, pid, Permission::ReadWrite)?;
        let mut page = page_pod.wl();
        let data = page.data_mut();
        self.set_slot_used(data, 0, true);
        data[header_bytes..header_bytes + tuple_size].copy_from_slice(&encoded);
        Ok(vec![pid])
    }

    fn delete_tuple(
        &self,
        buffer_pool: &BufferPool,
        tid: TransactionId,
        record_id: RecordId,
    ) -> EngineResult<Vec<PageId>> {
        let pid = record_id.page_id;
        let page_pod = buffer_pool.get_page(tid, pid, Permission::ReadWrite)?;
        let mut page = page_pod.wl();
        let data = page.data_mut();
        if !self.is_slot_used(data, record_id.slot_index) {
            return Err(EngineError::BadPageId(format!(
                "slot {} on {} is not in use",
                record_id.slot_index, pid
            )));
        }
        self.set_slot_used(data, record_id.slot_index, false);
        Ok(vec![pid])
    }

    fn iter<'a>(
        &'a self,
        buffer_pool: &'a BufferPool,
        tid: TransactionId,
    ) -> Box<dyn Iterator<Item = EngineResult<Tuple>> + 'a> {
        Box::new(HeapFileIter {
            file: self,
            buffer_pool,
            tid,
            page_number: 0,
            slot: 0,
        })
    }
}

struct HeapFileIter<'a> {
    file: &'a HeapFile,
    buffer_pool: &'a BufferPool,
    tid: TransactionId,
    page_number: usize,
    slot: usize,
}

impl<'a> Iterator for HeapFileIter<'a> {
    type Item = EngineResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        let num_slots = self.file.num_slots();
        loop {
            if self.page_number >= self.file.num_pages() {
                return None;
            }

            let pid = PageId::new(self.file.table_id, self.page_number);
            let page_pod = match self.buffer_pool.get_page(self.tid, pid, Permission::ReadOnly) {
                Ok(p) => p,
                Err(e) => return Some(Err(e)),
            };

            {
                let page = page_pod.rl();
                while self.slot < num_slots {
                    let slot = self.slot;
                    self.slot += 1;
                    if self.file.is_slot_used(page.data(), slot) {
                        let off = self.file.header_bytes() + slot * self.file.tuple_size();
                        let bytes = &page.data()[off..off + self.file.tuple_size()];
                        return Some(self.file.decode_tuple(bytes).map(|mut t| {
                            t.record_id = Some(RecordId::new(pid, slot));
                            t
                        }));
                    }
                }
            }

            self.page_number += 1;
            self.slot = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        buffer_pool::BufferPool, catalog::Catalog, lock_table::LockTable, tuple::FieldDesc,
    };
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    fn int_schema(n: usize) -> TupleDesc {
        let fields = (0..n)
            .map(|i| FieldDesc {
                name: format!("c{}", i),
                field_type: FieldType::Int,
            })
            .collect();
        TupleDesc::new(fields, Some(0))
    }

    fn fixture() -> (Arc<Catalog>, Arc<BufferPool>, i32) {
        let tmp = NamedTempFile::new().unwrap();
        let table_id = 1;
        let heap_file = HeapFile::new(tmp.path(), table_id, int_schema(2), 128).unwrap();
        std::mem::forget(tmp); // keep the backing file alive for the test's duration

        let catalog = Arc::new(Catalog::new());
        catalog.add_table(Arc::new(heap_file));

        let lock_table = Arc::new(LockTable::new());
        let buffer_pool = Arc::new(BufferPool::new(16, lock_table, Arc::clone(&catalog)));
        (catalog, buffer_pool, table_id)
    }

    #[test]
    fn insert_then_scan_round_trips() {
        let (catalog, buffer_pool, table_id) = fixture();
        let db_file = catalog.get_table(table_id).unwrap();
        let tid = TransactionId::new();

        for i in 0..5 {
            let tuple = Tuple::new(vec![Field::Int(i), Field::Int(i * 10)]);
            db_file.insert_tuple(&buffer_pool, tid, tuple).unwrap();
        }

        let scanned: Vec<Tuple> = db_file
            .iter(&buffer_pool, tid)
            .collect::<EngineResult<Vec<_>>>()
            .unwrap();
        assert_eq!(scanned.len(), 5);
        for (i, t) in scanned.iter().enumerate() {
            assert_eq!(t.fields[0], Field::Int(i as i32));
            assert_eq!(t.fields[1], Field::Int(i as i32 * 10));
        }
    }

    #[test]
    fn delete_frees_the_slot_for_reuse() {
        let (catalog, buffer_pool, table_id) = fixture();
        let db_file = catalog.get_table(table_id).unwrap();
        let tid = TransactionId::new();

        let pages = db_file
            .insert_tuple(&buffer_pool, tid, Tuple::new(vec![Field::Int(1), Field::Int(2)]))
            .unwrap();
        let record_id = RecordId::new(pages[0], 0);
        db_file.delete_tuple(&buffer_pool, tid, record_id).unwrap();

        let remaining: Vec<Tuple> = db_file
            .iter(&buffer_pool, tid)
            .collect::<EngineResult<Vec<_>>>()
            .unwrap();
        assert!(remaining.is_empty());

        db_file
            .insert_tuple(&buffer_pool, tid, Tuple::new(vec![Field::Int(9), Field::Int(9)]))
            .unwrap();
        let remaining: Vec<Tuple> = db_file
            .iter(&buffer_pool, tid)
            .collect::<EngineResult<Vec<_>>>()
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn inserting_past_one_page_grows_the_file() {
        let (catalog, buffer_pool, table_id) = fixture();
        let db_file = catalog.get_table(table_id).unwrap();
        let tid = TransactionId::new();

        for i in 0..50 {
            db_file
                .insert_tuple(&buffer_pool, tid, Tuple::new(vec![Field::Int(i), Field::Int(i)]))
                .unwrap();
        }

        assert!(db_file.num_pages() > 1);
        let count = db_file.iter(&buffer_pool, tid).count();
        assert_eq!(count, 50);
    }
}
