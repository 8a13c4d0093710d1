use std::sync::Arc;

use parking_lot::RwLock;

use crate::modeling::LoadedModel;

/// Holds the active model. Readers take a cheap `Arc` clone and keep using
/// it for the whole request; replacement swaps the entire reference under
/// the write lock so no reader ever sees a partial update.
pub struct ModelSlot {
    current: RwLock<Arc<LoadedModel>>,
}

impl ModelSlot {
    pub fn new(model: LoadedModel) -> Self {
        Self {
            current: RwLock::new(Arc::new(model)),
        }
    }

    pub fn current(&self) -> Arc<LoadedModel> {
        self.current.read().clone()
    }

    /// Installs `model` and returns the one it replaced.
    pub fn replace(&self, model: LoadedModel) -> Arc<LoadedModel> {
        std::mem::replace(&mut *self.current.write(), Arc::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modeling::testing::fixed_model;

    #[test]
    fn test_replace_swaps_whole_model() {
        let slot = ModelSlot::new(fixed_model(1.0, "m/1"));
        let held = slot.current();

        let previous = slot.replace(fixed_model(2.0, "m/2"));
        assert_eq!(previous.version(), "m/1");
        assert_eq!(slot.current().version(), "m/2");
        // A reader that grabbed the old model keeps a consistent view.
        assert_eq!(held.version(), "m/1");
    }

    #[test]
    fn test_concurrent_readers_during_swap() {
        let slot = Arc::new(ModelSlot::new(fixed_model(1.0, "m/1")));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let slot = slot.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let model = slot.current();
                        let value = model.predict(&[]).unwrap();
                        assert!(value.is_empty());
                        assert!(model.version() == "m/1" || model.version() == "m/2");
                    }
                })
            })
            .collect();
        slot.replace(fixed_model(2.0, "m/2"));
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(slot.current().version(), "m/2");
    }
}
