use thiserror::Error;

/// Failures computing a fingerprint from raw pixels
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("dHash decoded size mismatch: {actual_w}x{actual_h}, expected {expected_w}x{expected_h}")]
    SizeMismatch {
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },

    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("hash grid {width}x{height} does not fit in 64 bits")]
    GridTooLarge { width: u32, height: u32 },
}
