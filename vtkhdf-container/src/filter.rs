use std::io::{Read, Write};

use vtkhdf_error::{VtkHdfResult, vtkhdf_bail};

/// Highest accepted deflate level.
pub const MAX_DEFLATE_LEVEL: u32 = 9;

pub(crate) fn check_level(level: u32) -> VtkHdfResult<()> {
    if level > MAX_DEFLATE_LEVEL {
        vtkhdf_bail!("deflate level must be at most {MAX_DEFLATE_LEVEL}, got {level}");
    }
    Ok(())
}

/// Compress data with zlib.
pub(crate) fn deflate(data: &[u8], level: u32) -> VtkHdfResult<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

pub(crate) fn inflate(data: &[u8]) -> VtkHdfResult<Vec<u8>> {
    let mut decoder = flate2::read::ZlibDecoder::new(data);
    let mut result = Vec::new();
    decoder.read_to_end(&mut result)?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deflate_roundtrip() {
        let data: Vec<u8> = (0u8..7).cycle().take(1024).collect();
        let compressed = deflate(&data, 6).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn levels_above_nine_are_rejected() {
        assert!(check_level(9).is_ok());
        assert!(check_level(10).is_err());
    }
}
