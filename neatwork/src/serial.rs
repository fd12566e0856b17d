//! Length-prefixed little-endian binary primitives shared by the genome,
//! network and engine persistence routines.
//!
//! Keyed maps are written as a `u32` entry count followed by
//! `(from, to, value)` triples; keys are emitted in ascending order so that
//! saving the same data twice produces identical bytes.

use crate::EdgeKey;

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::io::{self, Read, Write};

/// A fixed-width value that can cross a byte stream in little-endian order.
pub(crate) trait Scalar: Sized {
    fn put(&self, writer: &mut impl Write) -> io::Result<()>;
    fn take(reader: &mut impl Read) -> io::Result<Self>;
}

macro_rules! impl_scalar {
    ($($ty:ty),*) => {$(
        impl Scalar for $ty {
            fn put(&self, writer: &mut impl Write) -> io::Result<()> {
                writer.write_all(&self.to_le_bytes())
            }

            fn take(reader: &mut impl Read) -> io::Result<Self> {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                reader.read_exact(&mut buf)?;
                Ok(<$ty>::from_le_bytes(buf))
            }
        }
    )*};
}

impl_scalar!(i32, u32, f32);

/// Reads an `i32` count and refuses negative values.
pub(crate) fn take_count(reader: &mut impl Read) -> io::Result<usize> {
    let count = i32::take(reader)?;
    if count < 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("negative record count {count}"),
        ));
    }
    Ok(count as usize)
}

pub(crate) fn put_edge_map<V, S>(
    map: &HashMap<EdgeKey, V, S>,
    writer: &mut impl Write,
) -> io::Result<()>
where
    V: Scalar,
    S: BuildHasher,
{
    (map.len() as u32).put(writer)?;
    let mut keys: Vec<EdgeKey> = map.keys().copied().collect();
    keys.sort_unstable();
    for key in keys {
        key.0.put(writer)?;
        key.1.put(writer)?;
        map[&key].put(writer)?;
    }
    Ok(())
}

pub(crate) fn take_edge_map<V, S>(reader: &mut impl Read) -> io::Result<HashMap<EdgeKey, V, S>>
where
    V: Scalar,
    S: BuildHasher + Default,
{
    let count = u32::take(reader)? as usize;
    let mut map = HashMap::with_capacity_and_hasher(count, S::default());
    for _ in 0..count {
        let from = i32::take(reader)?;
        let to = i32::take(reader)?;
        let value = V::take(reader)?;
        map.insert((from, to), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ahash::RandomState;
    use std::io::Cursor;

    #[test]
    fn edge_map_round_trips() {
        let mut map: HashMap<EdgeKey, f32, RandomState> = HashMap::default();
        map.insert((0, 3), 1.25);
        map.insert((3, 2), -0.5);
        map.insert((1, 2), 0.0);

        let mut bytes = Vec::new();
        put_edge_map(&map, &mut bytes).unwrap();
        let restored: HashMap<EdgeKey, f32, RandomState> =
            take_edge_map(&mut Cursor::new(&bytes)).unwrap();

        assert_eq!(map, restored);
    }

    #[test]
    fn map_output_is_key_ordered() {
        let mut map: HashMap<EdgeKey, i32, RandomState> = HashMap::default();
        map.insert((5, 1), 10);
        map.insert((0, 2), 20);

        let mut bytes = Vec::new();
        put_edge_map(&map, &mut bytes).unwrap();

        let mut reader = Cursor::new(&bytes);
        assert_eq!(u32::take(&mut reader).unwrap(), 2);
        assert_eq!(i32::take(&mut reader).unwrap(), 0);
        assert_eq!(i32::take(&mut reader).unwrap(), 2);
        assert_eq!(i32::take(&mut reader).unwrap(), 20);
        assert_eq!(i32::take(&mut reader).unwrap(), 5);
    }

    #[test]
    fn truncated_map_reports_eof() {
        let mut map: HashMap<EdgeKey, f32, RandomState> = HashMap::default();
        map.insert((0, 2), 1.0);

        let mut bytes = Vec::new();
        put_edge_map(&map, &mut bytes).unwrap();
        bytes.truncate(bytes.len() - 2);

        let result: io::Result<HashMap<EdgeKey, f32, RandomState>> =
            take_edge_map(&mut Cursor::new(&bytes));
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }
}
