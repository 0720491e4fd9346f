//! Word-addressed data memory
//!
//! Both the scalar and vector data memories (SDMEM, VDMEM) are instances of
//! the same [`WordMemory`] type: a fixed-size array of 32-bit signed words,
//! zero-initialized and then optionally overwritten by a loaded image. The
//! two memories are always separate instances, so there is no aliasing
//! between scalar and vector address spaces.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum MemoryError {
    #[error("memory access at index {index} is out of bounds for size {size}")]
    InvalidAddress { index: i64, size: usize },
}

/// A fixed-size, zero-initialized array of 32-bit signed words.
#[derive(Debug, Clone)]
pub struct WordMemory {
    data: Vec<i32>,
}

impl WordMemory {
    /// Create a new, zero-filled memory of the given capacity.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Overwrite the memory from the start with `image`. The image may be
    /// shorter than the memory's capacity, in which case the remaining tail
    /// stays zero (per the component's reset semantics); it is an error for
    /// the image to be longer than capacity.
    pub fn load_image(&mut self, image: &[i32]) {
        let n = image.len().min(self.data.len());
        self.data[..n].copy_from_slice(&image[..n]);
    }

    /// Read the word at `index`. `index` is taken as `i64` so that callers
    /// computing addresses from signed scalar arithmetic (e.g. a negative
    /// base plus a negative stride) can pass through a negative value and
    /// have it rejected as an out-of-bounds access rather than silently
    /// wrapping through a cast.
    pub fn read(&self, index: i64) -> Result<i32, MemoryError> {
        self.checked_index(index).map(|i| self.data[i])
    }

    /// Write `value` at `index`.
    pub fn write(&mut self, index: i64, value: i32) -> Result<(), MemoryError> {
        let i = self.checked_index(index)?;
        self.data[i] = value;
        Ok(())
    }

    /// Iterate over the memory contents in index order, for dumping.
    pub fn iter(&self) -> impl Iterator<Item = &i32> {
        self.data.iter()
    }

    fn checked_index(&self, index: i64) -> Result<usize, MemoryError> {
        if index >= 0 && (index as usize) < self.data.len() {
            Ok(index as usize)
        } else {
            Err(MemoryError::InvalidAddress {
                index,
                size: self.data.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_initialised() {
        let mem = WordMemory::new(16);
        for i in 0..16 {
            assert_eq!(mem.read(i).unwrap(), 0);
        }
    }

    #[test]
    fn write_then_read() {
        let mut mem = WordMemory::new(16);
        mem.write(3, 42).unwrap();
        assert_eq!(mem.read(3).unwrap(), 42);
        assert_eq!(mem.read(2).unwrap(), 0);
    }

    #[test]
    fn image_shorter_than_capacity_zero_fills_tail() {
        let mut mem = WordMemory::new(8);
        mem.load_image(&[5, 9, 6, 9]);
        assert_eq!(mem.read(0).unwrap(), 5);
        assert_eq!(mem.read(3).unwrap(), 9);
        assert_eq!(mem.read(4).unwrap(), 0);
        assert_eq!(mem.read(7).unwrap(), 0);
    }

    #[test]
    fn out_of_bounds_read_is_rejected() {
        let mem = WordMemory::new(4);
        assert_eq!(
            mem.read(4),
            Err(MemoryError::InvalidAddress { index: 4, size: 4 })
        );
    }

    #[test]
    fn negative_index_is_rejected() {
        let mem = WordMemory::new(4);
        assert_eq!(
            mem.read(-1),
            Err(MemoryError::InvalidAddress { index: -1, size: 4 })
        );
    }

    #[test]
    fn out_of_bounds_write_is_rejected() {
        let mut mem = WordMemory::new(4);
        assert_eq!(
            mem.write(10, 1),
            Err(MemoryError::InvalidAddress {
                index: 10,
                size: 4
            })
        );
    }
}
