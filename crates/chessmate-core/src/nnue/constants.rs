//! NNUE フォーマット定数
//!
//! 値は nnue-pytorch / Stockfish classic NNUE (HalfKP 256x2-32-32) に準拠。

/// サポートするファイルバージョン
pub const NNUE_VERSION: u32 = 0x7AF3_2F16;

/// Feature Transformer 出力次元
pub const L1: usize = 256;

/// 第1隠れ層出力次元
pub const L2: usize = 32;

/// 第2隠れ層出力次元
pub const L3: usize = 32;

/// Feature Transformer の量子化スケール（i16 → f32 の除数）
pub const FT_SCALE: f32 = 127.0;

/// 活性化の量子化スケール
pub const ACTIVATION_SCALE: f32 = 127.0;

/// 隠れFC層の bias スケール: (1 << 6) * 127 = 8128
pub const HIDDEN_BIAS_SCALE: f32 = 8128.0;

/// 出力層の bias スケール: kPonanzaConstant * FV_SCALE = 600 * 16
pub const OUTPUT_BIAS_SCALE: f32 = 9600.0;

/// FC層入力次元の SIMD パディング単位
pub const SIMD_WIDTH: usize = 32;

/// description 文字列長の上限（これを超える値は壊れたヘッダとみなす）
pub const MAX_DESC_LEN: usize = 4096;

/// 末尾次元を [`SIMD_WIDTH`] の倍数に切り上げる
#[inline]
pub const fn pad32(n: usize) -> usize {
    n.div_ceil(SIMD_WIDTH) * SIMD_WIDTH
}
