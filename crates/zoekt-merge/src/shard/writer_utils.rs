use std::io;

// Encoding helpers shared by the shard serializer in `index::writer`.

/// Append a u32 as an LEB128-style unsigned varint.
pub(crate) fn write_var_u32(buf: &mut Vec<u8>, mut v: u32) {
    while v >= 0x80 {
        buf.push((v as u8 & 0x7F) | 0x80);
        v >>= 7;
    }
    buf.push(v as u8);
}

/// Append a `[len: u16][utf8]` string.
pub(crate) fn write_str_u16(buf: &mut Vec<u8>, s: &str, what: &str) -> io::Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} too long ({} bytes)", what, s.len()),
        )
    })?;
    buf.extend(&len.to_le_bytes());
    buf.extend(s.as_bytes());
    Ok(())
}

/// Posting keys pack `tri24 | doc32 | pos32`, so only the low 88 bits vary.
const KEY_BITS: usize = 88;
const RADIX_BITS: usize = 11;

/// LSD radix sort over the significant bits of posting keys.
pub(crate) fn radix_sort_u128(buf: &mut [u128]) {
    if buf.len() <= 1 {
        return;
    }
    let mask = (1u128 << RADIX_BITS) - 1;
    let mut tmp = vec![0u128; buf.len()];
    let mut counts = vec![0usize; 1 << RADIX_BITS];
    for shift in (0..KEY_BITS).step_by(RADIX_BITS) {
        counts.iter_mut().for_each(|c| *c = 0);
        for &k in buf.iter() {
            counts[((k >> shift) & mask) as usize] += 1;
        }
        let mut sum = 0usize;
        for c in counts.iter_mut() {
            let n = *c;
            *c = sum;
            sum += n;
        }
        for &k in buf.iter() {
            let bucket = ((k >> shift) & mask) as usize;
            tmp[counts[bucket]] = k;
            counts[bucket] += 1;
        }
        buf.copy_from_slice(&tmp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::utils::read_var_u32_at;

    #[test]
    fn varint_boundaries() {
        let mut buf = vec![];
        for v in [0, 127, 128, 300, u32::MAX] {
            write_var_u32(&mut buf, v);
        }
        assert_eq!(buf.len(), 1 + 1 + 2 + 2 + 5);
        let mut off = 0;
        for v in [0, 127, 128, 300, u32::MAX] {
            assert_eq!(read_var_u32_at(&buf, &mut off).unwrap(), v);
        }
    }

    #[test]
    fn radix_sort_orders_packed_keys() {
        let key = |tri: u128, doc: u128, pos: u128| (tri << 64) | (doc << 32) | pos;
        let mut v = vec![
            key(0xFF_FFFF, 0, 0),
            key(1, 2, 3),
            key(1, 2, 1),
            key(1, 0, u32::MAX as u128),
            key(0, 9, 9),
        ];
        let mut want = v.clone();
        want.sort_unstable();
        radix_sort_u128(&mut v);
        assert_eq!(v, want);
    }

    #[test]
    fn long_strings_are_rejected() {
        let mut buf = vec![];
        let long = "x".repeat(u16::MAX as usize + 1);
        assert!(write_str_u16(&mut buf, &long, "name").is_err());
        assert!(buf.is_empty());
    }
}
