//! Fixed-capacity channel registry

use heapless::Vec;
use softpwm_core::{PinId, PwmError, PwmResult};

use crate::channel::Channel;

/// Ordered, contiguous set of channels.
///
/// Storage is `N` slots; the usable capacity is chosen at construction and
/// never exceeds `N`. Insertion order is scheduling order and removal
/// shifts the tail left, so indices stay dense.
pub struct Registry<L, const N: usize> {
    channels: Vec<Channel<L>, N>,
    capacity: usize,
}

impl<L: Copy, const N: usize> Registry<L, N> {
    /// Empty registry holding at most `min(capacity, N)` channels
    pub const fn new(capacity: usize) -> Self {
        Self {
            channels: Vec::new(),
            capacity: if capacity < N { capacity } else { N },
        }
    }

    /// Append a channel, returning its index.
    ///
    /// A pin may only be registered once.
    pub fn register(&mut self, channel: Channel<L>) -> PwmResult<usize> {
        if self.position(channel.pin()).is_some() {
            return Err(PwmError::DuplicatePin);
        }
        if self.channels.len() >= self.capacity {
            return Err(PwmError::CapacityFull);
        }

        let index = self.channels.len();
        self.channels
            .push(channel)
            .map_err(|_| PwmError::CapacityFull)?;
        Ok(index)
    }

    /// Take out the channel at `index`, shifting later ones down
    pub fn remove(&mut self, index: usize) -> PwmResult<Channel<L>> {
        if index >= self.channels.len() {
            return Err(PwmError::InvalidIndex);
        }
        Ok(self.channels.remove(index))
    }

    pub fn position(&self, pin: PinId) -> Option<usize> {
        self.channels.iter().position(|channel| channel.pin() == pin)
    }

    pub fn find(&self, pin: PinId) -> Option<&Channel<L>> {
        self.channels.iter().find(|channel| channel.pin() == pin)
    }

    pub fn find_mut(&mut self, pin: PinId) -> Option<&mut Channel<L>> {
        self.channels.iter_mut().find(|channel| channel.pin() == pin)
    }

    pub fn get(&self, index: usize) -> Option<&Channel<L>> {
        self.channels.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel<L>> {
        self.channels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Channel<L>> {
        self.channels.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.channels.len() >= self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pins(registry: &Registry<u8, 8>) -> std::vec::Vec<PinId> {
        registry.iter().map(Channel::pin).collect()
    }

    #[test]
    fn capacity_is_clamped_to_storage() {
        let registry: Registry<u8, 8> = Registry::new(32);
        assert_eq!(registry.capacity(), 8);
        let registry: Registry<u8, 8> = Registry::new(3);
        assert_eq!(registry.capacity(), 3);
    }

    #[test]
    fn duplicate_is_checked_before_capacity() {
        let mut registry: Registry<u8, 8> = Registry::new(1);
        assert_eq!(registry.register(Channel::new(4)), Ok(0));
        assert_eq!(registry.register(Channel::new(4)), Err(PwmError::DuplicatePin));
        assert_eq!(registry.register(Channel::new(5)), Err(PwmError::CapacityFull));
        assert!(registry.is_full());
    }

    #[test]
    fn removal_compacts_in_order() {
        let mut registry: Registry<u8, 8> = Registry::new(8);
        for pin in [10, 11, 12, 13, 14] {
            registry.register(Channel::new(pin)).unwrap();
        }

        let removed = registry.remove(2).unwrap();
        assert_eq!(removed.pin(), 12);
        assert_eq!(pins(&registry), [10, 11, 13, 14]);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.position(13), Some(2));

        assert_eq!(registry.remove(4).map(|c| c.pin()), Err(PwmError::InvalidIndex));
    }

    #[test]
    fn lookup_by_pin() {
        let mut registry: Registry<u8, 8> = Registry::new(4);
        registry.register(Channel::new(7)).unwrap();

        assert!(registry.find(7).is_some());
        assert!(registry.find(8).is_none());
        assert_eq!(registry.get(0).map(Channel::pin), Some(7));
        assert!(registry.get(1).is_none());
    }
}
