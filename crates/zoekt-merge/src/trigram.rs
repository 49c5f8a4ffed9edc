//! Trigram extraction over raw document bytes (Zoekt-style).
//! The builder derives content postings from these when it serializes a shard.

/// Extract lowercase ASCII word trigrams plus the byte offset where each
/// window starts. Any byte that is not `[A-Za-z0-9_]` resets the window.
pub fn trigrams_with_pos(hay: &[u8]) -> impl Iterator<Item = ([u8; 3], u32)> + '_ {
    TriPosIter {
        bytes: hay,
        i: 0,
        w: [0; 3],
        posw: [0u32; 3],
        n: 0,
    }
}

struct TriPosIter<'a> {
    bytes: &'a [u8],
    i: usize,
    w: [u8; 3],
    posw: [u32; 3],
    n: usize,
}

impl Iterator for TriPosIter<'_> {
    type Item = ([u8; 3], u32);

    fn next(&mut self) -> Option<Self::Item> {
        while self.i < self.bytes.len() {
            let b = self.bytes[self.i].to_ascii_lowercase();
            let pos = self.i as u32;
            self.i += 1;
            if !(b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_') {
                self.n = 0;
                continue;
            }
            if self.n < 3 {
                self.w[self.n] = b;
                self.posw[self.n] = pos;
                self.n += 1;
                if self.n < 3 {
                    continue;
                }
            } else {
                self.w = [self.w[1], self.w[2], b];
                self.posw = [self.posw[1], self.posw[2], pos];
            }
            return Some((self.w, self.posw[0]));
        }
        None
    }
}

/// Pack a trigram into the low 24 bits of a u32.
pub(crate) fn tri_to_u24(tri: [u8; 3]) -> u32 {
    (u32::from(tri[0]) << 16) | (u32::from(tri[1]) << 8) | u32::from(tri[2])
}

pub(crate) fn u24_to_tri(v: u32) -> [u8; 3] {
    [(v >> 16) as u8, (v >> 8) as u8, v as u8]
}
