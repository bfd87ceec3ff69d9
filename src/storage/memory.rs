use crate::error::{AppError, AppResult};
use crate::storage::ObjectSink;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory object storage for local runs.
pub struct InMemoryObjectSink {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectSink {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let objects = self.objects.read()
            .map_err(|_| AppError::Internal("Lock poisoned".to_string()))?;
        Ok(objects.get(key).cloned())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }
}

impl Default for InMemoryObjectSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectSink for InMemoryObjectSink {
    async fn put_object(&self, key: &str, data: &[u8]) -> AppResult<()> {
        let mut objects = self.objects.write()
            .map_err(|_| AppError::Internal("Lock poisoned".to_string()))?;
        objects.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}
