//! NNUE コーデックのエラー型
//!
//! 構造的な検証エラーは全て読み込みを即座に中断する（best-effort パースはしない）。
//! `expected` は静的なレイヤ構成表から計算した期待値、`stored` はファイルから
//! 読んだ値。この2つは常に別フィールドとして保持する。

use std::io;

use thiserror::Error;

use super::codec::Dtype;

#[derive(Debug, Error)]
pub enum NnueError {
    #[error("unsupported NNUE version: {stored:#010x} (expected {expected:#010x})")]
    UnsupportedVersion { expected: u32, stored: u32 },

    #[error("network hash mismatch: stored {stored:#010x}, expected {expected:#010x} for {arch}")]
    ArchitectureMismatch {
        arch: String,
        expected: u32,
        stored: u32,
    },

    #[error("{section} section hash mismatch: stored {stored:#010x}, expected {expected:#010x}")]
    SectionHashMismatch {
        section: &'static str,
        expected: u32,
        stored: u32,
    },

    #[error("truncated input at byte offset {offset} while reading {section}")]
    TruncatedInput { section: &'static str, offset: u64 },

    #[error("{remaining} trailing bytes after the output layer")]
    TrailingData { remaining: u64 },

    #[error("quantization overflow: {clamped} values clamped to the {dtype} range")]
    QuantizationOverflow { dtype: Dtype, clamped: u64 },

    #[error("unknown feature set: {name:?}")]
    UnknownFeatureSet { name: String },

    #[error("invalid description length: {len} (max {max})")]
    InvalidDescriptionLength { len: usize, max: usize },

    #[error("tensor shape mismatch in {section}: got {got} values, expected {expected}")]
    ShapeMismatch {
        section: &'static str,
        got: usize,
        expected: usize,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl NnueError {
    /// EOF 由来の io エラーをオフセット付きの `TruncatedInput` に変換する
    pub(crate) fn from_io(err: io::Error, section: &'static str, offset: u64) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            NnueError::TruncatedInput { section, offset }
        } else {
            NnueError::Io(err)
        }
    }
}
