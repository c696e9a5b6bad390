pub(crate) fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}
