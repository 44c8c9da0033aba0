//! Weighted non-repeating selection.
//!
//! Every item starts with weight 1. Each pick lowers the chosen item's weight
//! by the drop-off factor and raises everyone else's by the same amount, so
//! items that have not come up for a while become increasingly likely.
//!
//! - `drop_off = 0` degenerates to uniform random
//! - `drop_off = 1` never repeats the previous pick while there are two or more items

use rand::Rng;

use crate::error::{Error, Result};

#[derive(Clone, Debug)]
struct Weighted<T> {
    item: T,
    weight: f32,
}

#[derive(Clone, Debug)]
pub struct NonRepeatingSelector<T> {
    entries: Vec<Weighted<T>>,
    drop_off: f32,
}

impl<T> NonRepeatingSelector<T> {
    /// Fails with [`Error::InvalidDropOff`] unless `drop_off` is in `[0, 1]`.
    pub fn new(drop_off: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&drop_off) {
            return Err(Error::InvalidDropOff(drop_off));
        }
        Ok(Self { entries: Vec::new(), drop_off })
    }

    /// Replace the candidate set; all weights reset to 1.
    pub fn set_items(&mut self, items: impl IntoIterator<Item = T>) {
        self.entries = items.into_iter().map(|item| Weighted { item, weight: 1.0 }).collect();
    }

    pub fn with_items(mut self, items: impl IntoIterator<Item = T>) -> Self {
        self.set_items(items);
        self
    }

    #[inline] pub fn drop_off(&self) -> f32 { self.drop_off }

    #[inline] pub fn len(&self) -> usize { self.entries.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn weights(&self) -> impl Iterator<Item = f32> + '_ {
        self.entries.iter().map(|e| e.weight)
    }

    /// Pick an index and update the weights. `None` when there are no items.
    pub fn pick_index<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }

        let total: f32 = self.entries.iter().map(|e| e.weight).sum();
        let last = self.entries.len() - 1;
        let mut remaining = rng.gen::<f32>() * total;
        let mut chosen = last;
        for (index, entry) in self.entries[..last].iter().enumerate() {
            remaining -= entry.weight;
            if remaining < 0.0 {
                chosen = index;
                break;
            }
        }

        let drop_off = self.drop_off;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if index == chosen {
                entry.weight *= 1.0 - drop_off;
            } else {
                entry.weight += drop_off;
            }
        }

        Some(chosen)
    }

    /// Pick an item and update the weights. `None` when there are no items.
    pub fn pick<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&T> {
        let index = self.pick_index(rng)?;
        Some(&self.entries[index].item)
    }
}
