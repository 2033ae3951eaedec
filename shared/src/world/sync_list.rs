use std::any::Any;

use log::warn;

use netsync_serde::{ByteReader, ByteWriter, Serde, UnsignedVariableInteger};

use crate::{types::HostType, world::error::SyncListError};

/// Controls how a SyncList is replicated
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncListConfig {
    /// Replicate to the owning connection only
    pub owner_only: bool,
}

/// One entry of a SyncList operation log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncListOp {
    Add,
    Clear,
    Insert,
    RemoveAt,
    Set,
    Dirty,
    RemoveFirst,
    RemoveLast,
    AddRangeStart,
    AddRangeItem,
    AddRangeEnd,
    /// Application-defined code, applied by the list's custom hook
    Custom(u8),
}

impl SyncListOp {
    pub const HIGHEST_BUILT_IN: u8 = 10;

    pub fn code(&self) -> u8 {
        match self {
            SyncListOp::Add => 0,
            SyncListOp::Clear => 1,
            SyncListOp::Insert => 2,
            SyncListOp::RemoveAt => 3,
            SyncListOp::Set => 4,
            SyncListOp::Dirty => 5,
            SyncListOp::RemoveFirst => 6,
            SyncListOp::RemoveLast => 7,
            SyncListOp::AddRangeStart => 8,
            SyncListOp::AddRangeItem => 9,
            SyncListOp::AddRangeEnd => 10,
            SyncListOp::Custom(code) => *code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => SyncListOp::Add,
            1 => SyncListOp::Clear,
            2 => SyncListOp::Insert,
            3 => SyncListOp::RemoveAt,
            4 => SyncListOp::Set,
            5 => SyncListOp::Dirty,
            6 => SyncListOp::RemoveFirst,
            7 => SyncListOp::RemoveLast,
            8 => SyncListOp::AddRangeStart,
            9 => SyncListOp::AddRangeItem,
            10 => SyncListOp::AddRangeEnd,
            other => SyncListOp::Custom(other),
        }
    }
}

/// Type-erased view of a `SyncList<T>` used by the replication loop
pub trait ListSlot: Any {
    fn config(&self) -> &SyncListConfig;

    /// Takes the encoded operations recorded since the last drain
    fn drain_operations(&mut self) -> Vec<Box<[u8]>>;

    /// Encodes the current contents as AddRangeStart, one AddRangeItem per
    /// element and AddRangeEnd. Empty lists produce nothing.
    fn catch_up_operations(&self) -> Vec<Box<[u8]>>;

    /// Replays one encoded operation received from the server
    fn apply_operation(&mut self, reader: &mut ByteReader) -> Result<(), SyncListError>;

    fn len(&self) -> usize;

    fn item_type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

type OperationCallback = Box<dyn FnMut(SyncListOp, Option<usize>)>;
type CustomOperation<T> = Box<dyn FnMut(u8, usize, T, &mut Vec<T>)>;

/// An ordered collection replicated as an operation log.
///
/// Every mutation on the server is recorded as an encoded operation; replaying
/// the log in order on an empty list reproduces the server's contents.
pub struct SyncList<T: Serde + 'static> {
    host: HostType,
    config: SyncListConfig,
    items: Vec<T>,
    outbox: Vec<Box<[u8]>>,
    on_operation: Option<OperationCallback>,
    custom_operation: Option<CustomOperation<T>>,
}

impl<T: Serde + 'static> Default for SyncList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serde + 'static> SyncList<T> {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn from_vec(items: Vec<T>) -> Self {
        Self {
            host: HostType::Server,
            config: SyncListConfig::default(),
            items,
            outbox: Vec::new(),
            on_operation: None,
            custom_operation: None,
        }
    }

    pub fn with_config(mut self, config: SyncListConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_on_operation<F>(mut self, on_operation: F) -> Self
    where
        F: FnMut(SyncListOp, Option<usize>) + 'static,
    {
        self.set_on_operation(on_operation);
        self
    }

    pub fn with_custom_operation<F>(mut self, custom_operation: F) -> Self
    where
        F: FnMut(u8, usize, T, &mut Vec<T>) + 'static,
    {
        self.custom_operation = Some(Box::new(custom_operation));
        self
    }

    pub(crate) fn attach(&mut self, host: HostType) {
        self.host = host;
    }

    /// Installs the operation callback. A list that already holds items
    /// reports them as one AddRangeStart / AddRangeEnd pair right away.
    pub fn set_on_operation<F>(&mut self, on_operation: F)
    where
        F: FnMut(SyncListOp, Option<usize>) + 'static,
    {
        self.on_operation = Some(Box::new(on_operation));
        if !self.items.is_empty() {
            self.notify(SyncListOp::AddRangeStart, Some(0));
            self.notify(SyncListOp::AddRangeEnd, self.last_index());
        }
    }

    // Reading

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn config(&self) -> &SyncListConfig {
        &self.config
    }

    // Mutating, server only

    pub fn add(&mut self, item: T) -> Result<(), SyncListError> {
        self.check_server()?;
        self.record(SyncListOp::Add, None, Some(&item));
        self.items.push(item);
        self.notify(SyncListOp::Add, self.last_index());
        Ok(())
    }

    pub fn add_range<I: IntoIterator<Item = T>>(&mut self, items: I) -> Result<(), SyncListError> {
        self.check_server()?;
        self.record(SyncListOp::AddRangeStart, None, None);
        self.notify(SyncListOp::AddRangeStart, self.last_index());
        for item in items {
            self.record(SyncListOp::AddRangeItem, None, Some(&item));
            self.items.push(item);
        }
        self.record(SyncListOp::AddRangeEnd, None, None);
        self.notify(SyncListOp::AddRangeEnd, self.last_index());
        Ok(())
    }

    pub fn insert(&mut self, index: usize, item: T) -> Result<(), SyncListError> {
        self.check_server()?;
        if index > self.items.len() {
            return Err(self.out_of_range(index));
        }
        self.record(SyncListOp::Insert, Some(index), Some(&item));
        self.items.insert(index, item);
        self.notify(SyncListOp::Insert, Some(index));
        Ok(())
    }

    pub fn set(&mut self, index: usize, item: T) -> Result<(), SyncListError> {
        self.check_server()?;
        if index >= self.items.len() {
            return Err(self.out_of_range(index));
        }
        self.record(SyncListOp::Set, Some(index), Some(&item));
        self.items[index] = item;
        self.notify(SyncListOp::Set, Some(index));
        Ok(())
    }

    /// Removes an element. The first and last positions are sent as the
    /// shorter RemoveFirst / RemoveLast operations.
    pub fn remove_at(&mut self, index: usize) -> Result<T, SyncListError> {
        self.check_server()?;
        if index >= self.items.len() {
            return Err(self.out_of_range(index));
        }
        let op = if index == 0 {
            SyncListOp::RemoveFirst
        } else if index == self.items.len() - 1 {
            SyncListOp::RemoveLast
        } else {
            SyncListOp::RemoveAt
        };
        let index_field = (op == SyncListOp::RemoveAt).then_some(index);
        self.record(op, index_field, None);
        let removed = self.items.remove(index);
        self.notify(op, Some(index));
        Ok(removed)
    }

    pub fn remove_first(&mut self) -> Result<T, SyncListError> {
        self.remove_at(0)
    }

    pub fn remove_last(&mut self) -> Result<T, SyncListError> {
        let last = self.last_index().unwrap_or(0);
        self.remove_at(last)
    }

    pub fn clear(&mut self) -> Result<(), SyncListError> {
        self.check_server()?;
        self.record(SyncListOp::Clear, None, None);
        self.items.clear();
        self.notify(SyncListOp::Clear, None);
        Ok(())
    }

    /// Re-sends the element at `index`, e.g. after mutating it in place
    pub fn dirty(&mut self, index: usize) -> Result<(), SyncListError> {
        self.check_server()?;
        let Some(item) = self.items.get(index) else {
            return Err(self.out_of_range(index));
        };
        let item = item.clone();
        self.record(SyncListOp::Dirty, Some(index), Some(&item));
        self.notify(SyncListOp::Dirty, Some(index));
        Ok(())
    }

    /// Sends the element at `index` under an application-defined operation
    /// code. Receivers apply it through their custom operation hook.
    pub fn custom_operation(&mut self, code: u8, index: usize) -> Result<(), SyncListError> {
        self.check_server()?;
        if code <= SyncListOp::HIGHEST_BUILT_IN {
            return Err(SyncListError::InvalidCustomOperation {
                code,
                highest: SyncListOp::HIGHEST_BUILT_IN,
            });
        }
        let Some(item) = self.items.get(index) else {
            return Err(self.out_of_range(index));
        };
        let item = item.clone();
        self.record(SyncListOp::Custom(code), Some(index), Some(&item));
        self.notify(SyncListOp::Custom(code), Some(index));
        Ok(())
    }

    // Internal

    fn check_server(&self) -> Result<(), SyncListError> {
        if self.host == HostType::Server {
            Ok(())
        } else {
            warn!("Rejected SyncList mutation on a client");
            Err(SyncListError::ClientCannotMutate)
        }
    }

    fn out_of_range(&self, index: usize) -> SyncListError {
        SyncListError::IndexOutOfRange {
            index,
            len: self.items.len(),
        }
    }

    fn last_index(&self) -> Option<usize> {
        self.items.len().checked_sub(1)
    }

    fn record(&mut self, op: SyncListOp, index: Option<usize>, item: Option<&T>) {
        if self.host != HostType::Server {
            return;
        }
        self.outbox.push(encode_operation(op, index, item));
    }

    fn notify(&mut self, op: SyncListOp, index: Option<usize>) {
        if op == SyncListOp::AddRangeItem {
            return;
        }
        if let Some(on_operation) = self.on_operation.as_mut() {
            on_operation(op, index);
        }
    }

    fn read_index(&self, reader: &mut ByteReader, inclusive_end: bool) -> Result<usize, SyncListError> {
        let index: usize = UnsignedVariableInteger::de(reader)?.to()?;
        let len = self.items.len();
        let in_range = if inclusive_end { index <= len } else { index < len };
        if in_range {
            Ok(index)
        } else {
            Err(SyncListError::IndexOutOfRange { index, len })
        }
    }
}

/// Encodes one list operation: `[u8 op][varint index][element]`, each part
/// present only when given
pub fn encode_operation<T: Serde>(op: SyncListOp, index: Option<usize>, item: Option<&T>) -> Box<[u8]> {
    let mut writer = ByteWriter::new();
    op.code().ser(&mut writer);
    if let Some(index) = index {
        UnsignedVariableInteger::from(index).ser(&mut writer);
    }
    if let Some(item) = item {
        item.ser(&mut writer);
    }
    writer.to_bytes()
}

impl<T: Serde + 'static> ListSlot for SyncList<T> {
    fn config(&self) -> &SyncListConfig {
        &self.config
    }

    fn drain_operations(&mut self) -> Vec<Box<[u8]>> {
        std::mem::take(&mut self.outbox)
    }

    fn catch_up_operations(&self) -> Vec<Box<[u8]>> {
        if self.items.is_empty() {
            return Vec::new();
        }
        let mut output = Vec::with_capacity(self.items.len() + 2);
        output.push(encode_operation::<T>(SyncListOp::AddRangeStart, None, None));
        for item in &self.items {
            output.push(encode_operation(SyncListOp::AddRangeItem, None, Some(item)));
        }
        output.push(encode_operation::<T>(SyncListOp::AddRangeEnd, None, None));
        output
    }

    fn apply_operation(&mut self, reader: &mut ByteReader) -> Result<(), SyncListError> {
        let op = SyncListOp::from_code(u8::de(reader)?);
        let index = match op {
            SyncListOp::Add | SyncListOp::AddRangeItem => {
                self.items.push(T::de(reader)?);
                self.last_index()
            }
            SyncListOp::AddRangeStart | SyncListOp::AddRangeEnd => self.last_index(),
            SyncListOp::Insert => {
                let index = self.read_index(reader, true)?;
                self.items.insert(index, T::de(reader)?);
                Some(index)
            }
            SyncListOp::Set | SyncListOp::Dirty => {
                let index = self.read_index(reader, false)?;
                self.items[index] = T::de(reader)?;
                Some(index)
            }
            SyncListOp::RemoveAt => {
                let index = self.read_index(reader, false)?;
                self.items.remove(index);
                Some(index)
            }
            SyncListOp::RemoveFirst => {
                if self.items.is_empty() {
                    return Err(self.out_of_range(0));
                }
                self.items.remove(0);
                Some(0)
            }
            SyncListOp::RemoveLast => {
                let Some(index) = self.last_index() else {
                    return Err(self.out_of_range(0));
                };
                self.items.remove(index);
                Some(index)
            }
            SyncListOp::Clear => {
                self.items.clear();
                None
            }
            SyncListOp::Custom(code) => {
                let index = self.read_index(reader, false)?;
                let item = T::de(reader)?;
                match self.custom_operation.as_mut() {
                    Some(custom_operation) => custom_operation(code, index, item, &mut self.items),
                    None => self.items[index] = item,
                }
                Some(index)
            }
        };
        self.notify(op, index);
        Ok(())
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn item_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
