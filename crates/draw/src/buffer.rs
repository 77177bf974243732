use domino_protocol::{Fragment, PathStep, POINTS_PER_FRAGMENT};

/// How many steps a path can have, by default. At 4 bytes per step this is
/// 8kB of RAM.
pub const DEFAULT_PATH_CAPACITY: usize = 2048;

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("path of {total} steps doesn't fit in {capacity}")]
    TooLong { total: u16, capacity: usize },
    #[error("fragment at offset {offset} arrived before the start of a transfer")]
    NoTransfer { offset: u16 },
    #[error("fragment says the path has {actual} steps, but the transfer has {expected}")]
    SizeMismatch { expected: u16, actual: u16 },
    #[error("fragment at offset {offset} leaves a gap after step {filled}")]
    Gap { offset: u16, filled: usize },
    #[error("fragment at offset {offset} would change a finished path")]
    Frozen { offset: u16 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Transfer {
    None,
    Building,
    Complete,
}

/// Reassembles a path from fragments.
///
/// The steps are only ever filled in from the front: a write may overwrite
/// steps that we already have, but it may not skip over missing ones. That
/// way, "the last fragment arrived" really does mean "we have the whole path."
/// Once the path is complete it is frozen until the next transfer starts.
#[derive(Clone, Debug)]
pub struct PathBuffer<const N: usize = DEFAULT_PATH_CAPACITY> {
    steps: heapless::Vec<PathStep, N>,
    // The number of steps at the front of `steps` that have been written.
    filled: usize,
    transfer: Transfer,
}

impl<const N: usize> Default for PathBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PathBuffer<N> {
    pub const fn new() -> Self {
        Self {
            steps: heapless::Vec::new(),
            filled: 0,
            transfer: Transfer::None,
        }
    }

    /// Throws away the current path and gets ready to receive `total` steps.
    pub fn begin_transfer(&mut self, total: u16) -> Result<(), TransferError> {
        let len = usize::from(total);
        if len > N {
            return Err(TransferError::TooLong { total, capacity: N });
        }
        self.steps.clear();
        // We checked the length against the capacity.
        let _ = self.steps.resize_default(len);
        self.filled = 0;
        self.transfer = Transfer::Building;
        Ok(())
    }

    /// Writes `points` into the path, starting at step `offset`.
    ///
    /// At most `POINTS_PER_FRAGMENT` points are taken, and none past the end
    /// of the path. Returns the number of points written.
    pub fn write_range(&mut self, offset: u16, points: &[PathStep]) -> Result<usize, TransferError> {
        let start = usize::from(offset);
        if self.transfer == Transfer::None {
            return Err(TransferError::NoTransfer { offset });
        }
        if start > self.filled {
            return Err(TransferError::Gap {
                offset,
                filled: self.filled,
            });
        }

        let count = (self.steps.len() - start)
            .min(POINTS_PER_FRAGMENT)
            .min(points.len());
        let range = start..(start + count);

        if self.transfer == Transfer::Complete {
            // Re-sending part of a finished path is fine, as long as nothing changes.
            if self.steps[range] != points[..count] {
                return Err(TransferError::Frozen { offset });
            }
            return Ok(count);
        }

        self.steps[range].copy_from_slice(&points[..count]);
        self.filled = self.filled.max(start + count);
        if self.filled == self.steps.len() {
            self.transfer = Transfer::Complete;
        }
        Ok(count)
    }

    pub fn is_complete(&self) -> bool {
        self.transfer == Transfer::Complete
    }

    /// Applies a fragment, returning true if it completed the path.
    ///
    /// Re-applying the final fragment of a complete path returns true again.
    /// On error, the buffer is unchanged.
    pub fn apply(&mut self, frag: &Fragment) -> Result<bool, TransferError> {
        if frag.offset == 0 {
            self.begin_transfer(frag.total_size)?;
        } else if self.transfer != Transfer::None && usize::from(frag.total_size) != self.steps.len()
        {
            return Err(TransferError::SizeMismatch {
                expected: self.steps.len() as u16,
                actual: frag.total_size,
            });
        }

        let count = self.write_range(frag.offset, &frag.points)?;
        Ok(usize::from(frag.offset) + count == self.steps.len() && self.is_complete())
    }

    /// The steps of the path.
    ///
    /// While a transfer is in progress, the steps that haven't arrived yet are
    /// zeroed.
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domino_protocol::Fragments;
    use proptest::prelude::*;

    fn path(n: u16) -> Vec<PathStep> {
        (0..n).map(|i| PathStep::new(10 + i, (i * 7) % 360)).collect()
    }

    fn frag(offset: u16, total: u16, points: &[PathStep]) -> Fragment {
        Fragment {
            offset,
            total_size: total,
            points: heapless::Vec::from_slice(points).unwrap(),
        }
    }

    #[test]
    fn two_fragments_one_ready() {
        let p = path(10);
        let mut buf = PathBuffer::<64>::new();
        assert_eq!(buf.apply(&frag(0, 10, &p[0..8])), Ok(false));
        assert!(!buf.is_complete());
        assert_eq!(buf.apply(&frag(8, 10, &p[8..10])), Ok(true));
        assert_eq!(buf.steps(), &p[..]);
    }

    #[test]
    fn terminal_fragment_can_be_resent() {
        let p = path(10);
        let mut buf = PathBuffer::<64>::new();
        buf.apply(&frag(0, 10, &p[0..8])).unwrap();
        assert_eq!(buf.apply(&frag(8, 10, &p[8..10])), Ok(true));
        assert_eq!(buf.apply(&frag(8, 10, &p[8..10])), Ok(true));
        assert_eq!(buf.steps(), &p[..]);
    }

    #[test]
    fn finished_path_is_frozen() {
        let p = path(10);
        let mut buf = PathBuffer::<64>::new();
        buf.apply(&frag(0, 10, &p[0..8])).unwrap();
        buf.apply(&frag(8, 10, &p[8..10])).unwrap();

        let other = [PathStep::new(1, 1), PathStep::new(2, 2)];
        assert_eq!(
            buf.apply(&frag(8, 10, &other)),
            Err(TransferError::Frozen { offset: 8 })
        );
        assert_eq!(buf.steps(), &p[..]);
    }

    #[test]
    fn rejects_fragment_before_start() {
        let p = path(4);
        let mut buf = PathBuffer::<64>::new();
        assert_eq!(
            buf.apply(&frag(4, 8, &p)),
            Err(TransferError::NoTransfer { offset: 4 })
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_gaps_and_mismatches() {
        let p = path(12);
        let mut buf = PathBuffer::<64>::new();
        buf.apply(&frag(0, 12, &p[0..4])).unwrap();
        assert_eq!(
            buf.apply(&frag(8, 12, &p[8..12])),
            Err(TransferError::Gap {
                offset: 8,
                filled: 4
            })
        );
        assert_eq!(
            buf.apply(&frag(4, 20, &p[4..8])),
            Err(TransferError::SizeMismatch {
                expected: 12,
                actual: 20
            })
        );
        assert_eq!(buf.apply(&frag(4, 12, &p[4..8])), Ok(false));
        assert_eq!(buf.apply(&frag(8, 12, &p[8..12])), Ok(true));
    }

    #[test]
    fn rejects_offset_past_end() {
        let p = path(4);
        let mut buf = PathBuffer::<64>::new();
        buf.apply(&frag(0, 4, &p)).unwrap();
        assert!(buf.apply(&frag(9, 4, &p)).is_err());
        assert_eq!(buf.steps(), &p[..]);
    }

    #[test]
    fn too_long_leaves_old_path() {
        let p = path(4);
        let mut buf = PathBuffer::<8>::new();
        buf.apply(&frag(0, 4, &p)).unwrap();
        assert_eq!(
            buf.apply(&frag(0, 9, &p)),
            Err(TransferError::TooLong {
                total: 9,
                capacity: 8
            })
        );
        assert!(buf.is_complete());
        assert_eq!(buf.steps(), &p[..]);
    }

    #[test]
    fn empty_path_completes_immediately() {
        let mut buf = PathBuffer::<8>::new();
        assert_eq!(buf.apply(&frag(0, 0, &[])), Ok(true));
        assert!(buf.is_empty());
    }

    #[test]
    fn new_transfer_discards_old_path() {
        let p = path(6);
        let mut buf = PathBuffer::<64>::new();
        buf.apply(&frag(0, 6, &p[0..6])).unwrap();
        assert_eq!(buf.apply(&frag(0, 3, &p[0..2])), Ok(false));
        assert_eq!(buf.len(), 3);
        assert!(!buf.is_complete());
        assert_eq!(buf.steps()[2], PathStep::default());
    }

    #[test]
    fn short_fragment_does_not_complete_early() {
        // Four points in a six-step path: the last two steps are still missing.
        let p = path(6);
        let mut buf = PathBuffer::<64>::new();
        assert_eq!(buf.apply(&frag(0, 6, &p[0..4])), Ok(false));
        assert_eq!(buf.apply(&frag(4, 6, &p[4..6])), Ok(true));
    }

    proptest! {
        #[test]
        fn reassembles_any_path(n in 0u16..200, per in 1usize..=8) {
            let p = path(n);
            let mut buf = PathBuffer::<256>::new();
            let mut ready = 0;
            for f in Fragments::new(&p, per) {
                if buf.apply(&f).unwrap() {
                    ready += 1;
                }
            }
            prop_assert_eq!(ready, 1);
            prop_assert_eq!(buf.steps(), &p[..]);
        }
    }
}
