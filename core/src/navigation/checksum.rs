/// XOR-fold checksum used by the navigation unit's text frames.
pub struct ChecksumCodec;

impl ChecksumCodec {
    /// Two uppercase hex digits of the XOR of every byte in `content`.
    pub fn compute(content: impl AsRef<[u8]>) -> String {
        let folded = content.as_ref().iter().fold(0u8, |acc, byte| acc ^ byte);
        format!("{:02X}", folded)
    }

    pub fn verify(content: impl AsRef<[u8]>, provided: &str) -> bool {
        Self::compute(content).eq_ignore_ascii_case(provided.trim())
    }
}
