use serde::{Deserialize, Serialize};

use crate::{
    DecodeError, PathStep, FRAGMENT_HEADER_LEN, MAX_FRAGMENT_LEN, MIN_FRAGMENT_LEN,
    POINTS_PER_FRAGMENT, STEP_LEN,
};

pub type FragmentBytes = heapless::Vec<u8, MAX_FRAGMENT_LEN>;

/// A piece of a path transfer.
///
/// A path is too long to send in one write, so it's cut into fragments. Each
/// fragment says where its points go (`offset`, as a step index) and how long
/// the whole path is (`total_size`, repeated in every fragment of a transfer).
/// A fragment with `offset == 0` starts a new transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub offset: u16,
    pub total_size: u16,
    pub points: heapless::Vec<PathStep, POINTS_PER_FRAGMENT>,
}

impl Fragment {
    /// Parses a fragment.
    ///
    /// Bytes after the last whole point are ignored. This doesn't check the
    /// size limits of the transport; that's the receiver's job.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < FRAGMENT_HEADER_LEN {
            return Err(DecodeError::TooShort(bytes.len()));
        }
        let (header, body) = bytes.split_at(FRAGMENT_HEADER_LEN);
        let count = body.len() / STEP_LEN;
        if count > POINTS_PER_FRAGMENT {
            return Err(DecodeError::TooManyPoints(count));
        }

        let mut points = heapless::Vec::new();
        for chunk in body.chunks_exact(STEP_LEN) {
            let step = PathStep::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            // We checked the count above, so this can't overflow.
            let _ = points.push(step);
        }

        Ok(Fragment {
            offset: u16::from_le_bytes([header[0], header[1]]),
            total_size: u16::from_le_bytes([header[2], header[3]]),
            points,
        })
    }

    /// Encodes this fragment.
    ///
    /// The robot drops writes shorter than [`MIN_FRAGMENT_LEN`], which an
    /// empty fragment would be, so short encodings are zero-padded.
    pub fn encode(&self) -> FragmentBytes {
        let mut buf = FragmentBytes::new();
        // Capacity is exactly header + 8 points, and `points` holds at most 8.
        let _ = buf.extend_from_slice(&self.offset.to_le_bytes());
        let _ = buf.extend_from_slice(&self.total_size.to_le_bytes());
        for p in &self.points {
            let _ = buf.extend_from_slice(&p.to_bytes());
        }
        while buf.len() < MIN_FRAGMENT_LEN {
            let _ = buf.push(0);
        }
        buf
    }

    /// Is this the fragment that completes its transfer?
    pub fn is_terminal(&self) -> bool {
        usize::from(self.offset) + self.points.len() == usize::from(self.total_size)
    }
}

/// Splits a path into fragments, in increasing offset order.
///
/// An empty path still produces one (empty) fragment, so that the receiver
/// learns that the old path is gone.
pub struct Fragments<'a> {
    steps: &'a [PathStep],
    per_fragment: usize,
    next: usize,
    done: bool,
}

impl<'a> Fragments<'a> {
    /// `per_fragment` is clamped to `1..=8`.
    ///
    /// Paths longer than `u16::MAX` steps can't be described by the header;
    /// only the first `u16::MAX` steps are sent.
    pub fn new(steps: &'a [PathStep], per_fragment: usize) -> Self {
        let len = steps.len().min(usize::from(u16::MAX));
        Self {
            steps: &steps[..len],
            per_fragment: per_fragment.clamp(1, POINTS_PER_FRAGMENT),
            next: 0,
            done: false,
        }
    }
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        if self.done {
            return None;
        }
        let end = (self.next + self.per_fragment).min(self.steps.len());
        let mut points = heapless::Vec::new();
        for step in &self.steps[self.next..end] {
            let _ = points.push(*step);
        }
        let frag = Fragment {
            offset: self.next as u16,
            total_size: self.steps.len() as u16,
            points,
        };
        self.next = end;
        self.done = end == self.steps.len();
        Some(frag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn steps(n: u16) -> Vec<PathStep> {
        (0..n).map(|i| PathStep::new(i * 3, i % 360)).collect()
    }

    #[test]
    fn decode_known_bytes() {
        let bytes = [0x08, 0x00, 0x0a, 0x00, 0x10, 0x00, 0x5a, 0x00, 0x05, 0x00, 0xb4, 0x00];
        let frag = Fragment::decode(&bytes).unwrap();
        assert_eq!(frag.offset, 8);
        assert_eq!(frag.total_size, 10);
        assert_eq!(
            frag.points.as_slice(),
            &[PathStep::new(16, 90), PathStep::new(5, 180)]
        );
        assert!(frag.is_terminal());
    }

    #[test]
    fn decode_ignores_partial_point() {
        let bytes = [0, 0, 1, 0, 7, 0];
        let frag = Fragment::decode(&bytes).unwrap();
        assert_eq!(frag.total_size, 1);
        assert!(frag.points.is_empty());
    }

    #[test]
    fn decode_rejects_bad_lengths() {
        assert_eq!(Fragment::decode(&[0, 0, 1]), Err(DecodeError::TooShort(3)));
        let long = [0u8; MAX_FRAGMENT_LEN + STEP_LEN];
        assert_eq!(Fragment::decode(&long), Err(DecodeError::TooManyPoints(9)));
    }

    #[test]
    fn empty_path_is_one_padded_fragment() {
        let frags: Vec<_> = Fragments::new(&[], 4).collect();
        assert_eq!(frags.len(), 1);
        assert!(frags[0].is_terminal());
        assert_eq!(frags[0].encode().as_slice(), &[0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn ble_sized_fragments() {
        let path = steps(10);
        let frags: Vec<_> = Fragments::new(&path, crate::POINTS_PER_BLE_WRITE).collect();
        let offsets: Vec<_> = frags.iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert!(frags.iter().all(|f| f.encode().len() <= crate::BLE_WRITE_LEN));
        assert!(frags.last().unwrap().is_terminal());
        assert!(!frags[0].is_terminal());
    }

    proptest! {
        #[test]
        fn fragments_cover_the_path(n in 0u16..100, per in 1usize..=8) {
            let path = steps(n);
            let mut rebuilt = Vec::new();
            for frag in Fragments::new(&path, per) {
                prop_assert_eq!(frag.total_size, n);
                prop_assert_eq!(usize::from(frag.offset), rebuilt.len());
                let decoded = Fragment::decode(&frag.encode()).unwrap();
                rebuilt.extend_from_slice(&decoded.points);
            }
            prop_assert_eq!(rebuilt, path);
        }
    }
}
