//! Multi-resource source: several resources read as one sequence.

use batchwise_types::error::BatchError;
use batchwise_types::resource::Resource;

use crate::item::{ItemReader, ResourceItemReader};

/// Concatenates the items of an ordered list of resources through a single
/// delegate reader.
///
/// Each resource is exhausted before the delegate is re-bound to the next
/// one, which re-applies the delegate's header skipping. The list is
/// iterated in the order given; sorting it is the caller's concern.
pub struct MultiResourceReader<D> {
    resources: Vec<Resource>,
    delegate: D,
    index: usize,
    bound: bool,
}

impl<D> MultiResourceReader<D> {
    #[must_use]
    pub fn new(resources: Vec<Resource>, delegate: D) -> Self {
        Self {
            resources,
            delegate,
            index: 0,
            bound: false,
        }
    }

    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Replace the resource list. Takes effect from the next `open`.
    pub fn set_resources(&mut self, resources: Vec<Resource>) {
        self.resources = resources;
    }

    /// Resource the delegate is currently bound to.
    #[must_use]
    pub fn current_resource(&self) -> Option<&Resource> {
        if self.bound {
            self.resources.get(self.index)
        } else {
            None
        }
    }
}

impl<T, D> ItemReader<T> for MultiResourceReader<D>
where
    D: ResourceItemReader<T>,
{
    fn open(&mut self) -> Result<(), BatchError> {
        if self.bound {
            self.delegate.close()?;
        }
        self.index = 0;
        self.bound = false;
        tracing::debug!(resources = self.resources.len(), "Opened multi-resource source");
        Ok(())
    }

    fn read(&mut self) -> Result<Option<T>, BatchError> {
        loop {
            if !self.bound {
                let Some(resource) = self.resources.get(self.index) else {
                    return Ok(None);
                };
                self.delegate.open_resource(resource)?;
                self.bound = true;
                tracing::debug!(resource = %resource, "Reading resource");
            }

            if let Some(item) = self.delegate.read()? {
                return Ok(Some(item));
            }
            self.delegate.close()?;
            self.bound = false;
            self.index += 1;
        }
    }

    fn discard_failed(&mut self) {
        if self.bound {
            self.delegate.discard_failed();
        }
    }

    fn close(&mut self) -> Result<(), BatchError> {
        if self.bound {
            self.bound = false;
            self.delegate.close()?;
        }
        Ok(())
    }
}
