use std::io;

/// Blocking byte transport driving one link.
///
/// The link calls each operation at most once per poll. `Err` from either
/// call surfaces as an IO error event; `Ok(0)` from `read` means the peer is
/// gone. Short writes are tolerated, the link keeps the remainder.
pub trait Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
}

impl<T: io::Read + io::Write> Transport for T {
    #[inline]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(self, buf)
    }

    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(self, buf)
    }
}
