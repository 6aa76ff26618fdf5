//! Bounds checked little-endian reads from an encoded byte slice.

pub(crate) struct ByteReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    pub(crate) fn take(&mut self, length: usize) -> Result<&'a [u8], String> {
        if length > self.remaining() {
            return Err(format!(
                "unexpected end of data at byte {}, needed {length} bytes but {} remain",
                self.position,
                self.remaining()
            ));
        }
        let bytes = &self.bytes[self.position..self.position + length];
        self.position += length;
        Ok(bytes)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], String> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.take(N)?);
        Ok(array)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, String> {
        Ok(self.take_array::<1>()?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, String> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64, String> {
        Ok(i64::from_le_bytes(self.take_array()?))
    }

    /// Read a `u64` length and check it fits in the remaining bytes.
    pub(crate) fn read_length(&mut self) -> Result<usize, String> {
        let length = self.read_u64()?;
        usize::try_from(length)
            .ok()
            .filter(|length| *length <= self.remaining())
            .ok_or_else(|| {
                format!(
                    "length {length} exceeds the {} remaining bytes",
                    self.remaining()
                )
            })
    }

    pub(crate) fn expect_magic(&mut self, magic: &[u8]) -> Result<(), String> {
        let found = self.take(magic.len())?;
        if found == magic {
            Ok(())
        } else {
            Err(format!("expected magic {magic:?}, found {found:?}"))
        }
    }

    pub(crate) fn finish(self) -> Result<(), String> {
        if self.remaining() == 0 {
            Ok(())
        } else {
            Err(format!("{} trailing bytes", self.remaining()))
        }
    }
}
