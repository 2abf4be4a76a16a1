// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

/// Reference-counted byte payload with copy-on-write mutation.
///
/// Cloning shares the bytes. [`data_mut`](Memory::data_mut) copies them
/// first when another handle still refers to them.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Memory {
    data: Arc<Vec<u8>>,
}

impl Memory {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        Arc::make_mut(&mut self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when other handles share these bytes.
    pub fn is_shared(&self) -> bool {
        Arc::strong_count(&self.data) > 1
    }

    pub fn shares_data_with(&self, other: &Memory) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl From<Vec<u8>> for Memory {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("len", &self.data.len())
            .field("shared", &self.is_shared())
            .finish()
    }
}
