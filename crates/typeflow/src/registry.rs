use std::any::Any;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::DataId;

/// An opaque client value. The registry compares handles by allocation
/// identity, never by content, and keeps a clone alive so every handle
/// outlives the bindings that refer to it.
pub type DataHandle = Rc<dyn Any>;

/// De-duplicates client handles into canonical [`DataId`] tokens.
///
/// Interning the same allocation twice yields the same token; two
/// allocations that happen to hold equal values yield distinct tokens.
#[derive(Default)]
pub struct DataRegistry {
    by_identity: FxHashMap<*const (), DataId>,
    handles: Vec<DataHandle>,
}

impl DataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, handle: &DataHandle) -> DataId {
        let key = Rc::as_ptr(handle).cast::<()>();
        if let Some(&id) = self.by_identity.get(&key) {
            return id;
        }
        let id = DataId::from(self.handles.len());
        self.by_identity.insert(key, id);
        self.handles.push(Rc::clone(handle));
        id
    }

    pub fn get(&self, id: DataId) -> &DataHandle {
        &self.handles[usize::from(id)]
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl std::fmt::Debug for DataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataRegistry")
            .field("handles", &self.handles.len())
            .finish()
    }
}
