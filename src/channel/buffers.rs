//! Provider-aligned channel buffers.

/// Alignment the provider requires for channel send/receive buffers.
pub const CHANNEL_BUFFER_ALIGN: usize = 512;

#[repr(C, align(512))]
#[derive(Clone, Copy)]
struct Block([u8; CHANNEL_BUFFER_ALIGN]);

/// Byte buffer whose start is aligned to `CHANNEL_BUFFER_ALIGN` and whose
/// length is a whole number of aligned blocks.
pub struct AlignedBuffer {
    blocks: Box<[Block]>,
}

impl AlignedBuffer {
    /// Allocate at least `len` bytes, rounded up to the alignment.
    pub fn new(len: usize) -> Self {
        let count = len.div_ceil(CHANNEL_BUFFER_ALIGN);
        Self {
            blocks: vec![Block([0; CHANNEL_BUFFER_ALIGN]); count].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len() * CHANNEL_BUFFER_ALIGN
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.blocks.as_ptr().cast()
    }

    /// Non-empty and starting on an aligned address.
    pub fn is_aligned(&self) -> bool {
        !self.is_empty() && (self.as_ptr() as usize) % CHANNEL_BUFFER_ALIGN == 0
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("len", &self.len())
            .field("ptr", &self.as_ptr())
            .finish()
    }
}

/// The receive/send pair handed to `open_channel`.
#[derive(Debug)]
pub struct ChannelBuffers {
    pub receive: AlignedBuffer,
    pub send: AlignedBuffer,
}

impl ChannelBuffers {
    pub fn new(receive_len: usize, send_len: usize) -> Self {
        Self {
            receive: AlignedBuffer::new(receive_len),
            send: AlignedBuffer::new(send_len),
        }
    }

    /// Both buffers satisfy the provider's precondition.
    pub fn is_valid(&self) -> bool {
        self.receive.is_aligned() && self.send.is_aligned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths_round_up_to_alignment() {
        let buffers = ChannelBuffers::new(16, 512);
        assert_eq!(buffers.receive.len(), 512);
        assert_eq!(buffers.send.len(), 512);

        let big = AlignedBuffer::new(4097);
        assert_eq!(big.len(), 4608);
    }

    #[test]
    fn test_buffers_are_aligned() {
        let buffers = ChannelBuffers::new(4096, 1024);
        assert!(buffers.is_valid());
        assert_eq!(buffers.send.as_ptr() as usize % CHANNEL_BUFFER_ALIGN, 0);
    }

    #[test]
    fn test_empty_buffer_is_invalid() {
        let buffers = ChannelBuffers::new(0, 512);
        assert!(buffers.receive.is_empty());
        assert!(!buffers.is_valid());
    }
}
