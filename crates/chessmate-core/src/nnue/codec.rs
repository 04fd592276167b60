//! 量子化テンソルの低レベル読み書き
//!
//! 固定幅整数（リトルエンディアン）の列を f32 テンソルへ変換する。
//! 形状操作（転置・パディング除去）は純関数として分離してある。

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::constants::pad32;
use super::error::NnueError;

/// 量子化データ型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    I8,
    I16,
    I32,
}

impl Dtype {
    /// 1要素のバイト数
    pub const fn size(self) -> usize {
        match self {
            Dtype::I8 => 1,
            Dtype::I16 => 2,
            Dtype::I32 => 4,
        }
    }

    /// 表現可能な範囲
    pub const fn range(self) -> (f32, f32) {
        match self {
            Dtype::I8 => (i8::MIN as f32, i8::MAX as f32),
            Dtype::I16 => (i16::MIN as f32, i16::MAX as f32),
            Dtype::I32 => (i32::MIN as f32, i32::MAX as f32),
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Dtype::I8 => "i8",
            Dtype::I16 => "i16",
            Dtype::I32 => "i32",
        };
        write!(f, "{s}")
    }
}

/// エンコード時の量子化診断
///
/// クランプは量子化の本質的な損失なので既定ではエラーにしないが、
/// 発生回数は呼び出し側から観測できる。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuantStats {
    /// クランプされた（丸め値が表現範囲を超えた）要素数
    pub clamped: u64,
    /// クランプ幅の最大値（量子化整数単位）
    pub max_clamp_error: f32,
}

impl QuantStats {
    pub fn merge(&mut self, other: QuantStats) {
        self.clamped += other.clamped;
        self.max_clamp_error = self.max_clamp_error.max(other.max_clamp_error);
    }
}

/// 消費バイト数を追跡する Read ラッパ
///
/// EOF はセクション名とバイトオフセット付きの `TruncatedInput` に変換する。
pub struct TrackedReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> TrackedReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// これまでに消費したバイト数
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn read_exact(&mut self, buf: &mut [u8], section: &'static str) -> Result<(), NnueError> {
        self.inner
            .read_exact(buf)
            .map_err(|e| NnueError::from_io(e, section, self.offset))?;
        self.offset += buf.len() as u64;
        Ok(())
    }

    pub fn read_u32(&mut self, section: &'static str) -> Result<u32, NnueError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf, section)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// ストリームを読み切り、残っていたバイト数を返す
    pub fn drain(&mut self) -> Result<u64, NnueError> {
        let n = std::io::copy(&mut self.inner, &mut std::io::sink())?;
        self.offset += n;
        Ok(n)
    }
}

/// テンソルを1本デコードする
///
/// `product(raw_shape) * dtype.size()` バイトを正確に読み、f32 へ変換して
/// `scale` で除算する。バイト不足は `TruncatedInput`。
pub fn decode_tensor<R: Read>(
    reader: &mut TrackedReader<R>,
    dtype: Dtype,
    raw_shape: &[usize],
    scale: f32,
    section: &'static str,
) -> Result<Vec<f32>, NnueError> {
    let count: usize = raw_shape.iter().product();
    let mut buf = vec![0u8; count * dtype.size()];
    reader.read_exact(&mut buf, section)?;

    let mut out = Vec::with_capacity(count);
    match dtype {
        Dtype::I8 => {
            out.extend(buf.iter().map(|&b| b as i8 as f32 / scale));
        }
        Dtype::I16 => {
            let mut raw = vec![0i16; count];
            LittleEndian::read_i16_into(&buf, &mut raw);
            out.extend(raw.iter().map(|&v| v as f32 / scale));
        }
        Dtype::I32 => {
            let mut raw = vec![0i32; count];
            LittleEndian::read_i32_into(&buf, &mut raw);
            out.extend(raw.iter().map(|&v| v as f32 / scale));
        }
    }
    Ok(out)
}

/// テンソルを1本エンコードする
///
/// `round(v * scale)` を dtype の範囲にクランプして書き出す。
/// クランプ発生数は `QuantStats` に集計する。
pub fn encode_tensor<W: Write>(
    writer: &mut W,
    values: &[f32],
    dtype: Dtype,
    scale: f32,
) -> Result<QuantStats, NnueError> {
    let (min, max) = dtype.range();
    let mut stats = QuantStats::default();
    for &v in values {
        let q = (v * scale).round();
        let c = q.clamp(min, max);
        if c != q {
            stats.clamped += 1;
            stats.max_clamp_error = stats.max_clamp_error.max((q - c).abs());
        }
        match dtype {
            Dtype::I8 => writer.write_i8(c as i8)?,
            Dtype::I16 => writer.write_i16::<LittleEndian>(c as i16)?,
            Dtype::I32 => writer.write_i32::<LittleEndian>(c as i32)?,
        }
    }
    Ok(stats)
}

/// `[rows][cols]` の行優先テンソルを `[cols][rows]` に転置する
pub fn transpose(data: &[f32], rows: usize, cols: usize) -> Vec<f32> {
    debug_assert_eq!(data.len(), rows * cols);
    let mut out = vec![0.0f32; data.len()];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = data[r * cols + c];
        }
    }
    out
}

/// パディングされた末尾次元を論理幅まで切り詰める
///
/// パディング列の内容は検証しない（フォーマット側が値を規定しないため）。
pub fn strip_padding(data: &[f32], rows: usize, logical_cols: usize) -> Vec<f32> {
    let padded_cols = pad32(logical_cols);
    debug_assert_eq!(data.len(), rows * padded_cols);
    let mut out = Vec::with_capacity(rows * logical_cols);
    for r in 0..rows {
        out.extend_from_slice(&data[r * padded_cols..r * padded_cols + logical_cols]);
    }
    out
}

/// 末尾次元をゼロ埋めでパディングする（strip_padding の逆）
pub fn add_padding(data: &[f32], rows: usize, logical_cols: usize) -> Vec<f32> {
    let padded_cols = pad32(logical_cols);
    debug_assert_eq!(data.len(), rows * logical_cols);
    let mut out = vec![0.0f32; rows * padded_cols];
    for r in 0..rows {
        out[r * padded_cols..r * padded_cols + logical_cols]
            .copy_from_slice(&data[r * logical_cols..(r + 1) * logical_cols]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tracked(bytes: Vec<u8>) -> TrackedReader<Cursor<Vec<u8>>> {
        TrackedReader::new(Cursor::new(bytes))
    }

    #[test]
    fn test_decode_i8_scale() {
        // 既知サンプル: i8 の 64 を scale 64.0 でデコードすると 1.0
        let mut r = tracked(vec![64u8, 0x80]);
        let t = decode_tensor(&mut r, Dtype::I8, &[2], 64.0, "test").unwrap();
        assert_eq!(t, vec![1.0, -2.0]);
    }

    #[test]
    fn test_decode_i16_le() {
        let mut bytes = Vec::new();
        for v in [127i16, -127, 254] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let mut r = tracked(bytes);
        let t = decode_tensor(&mut r, Dtype::I16, &[3], 127.0, "test").unwrap();
        assert_eq!(t, vec![1.0, -1.0, 2.0]);
        assert_eq!(r.offset(), 6);
    }

    #[test]
    fn test_decode_truncated() {
        // 4要素ぶん要求して3要素しかない
        let mut r = tracked(vec![0u8; 6]);
        let err = decode_tensor(&mut r, Dtype::I16, &[4], 1.0, "fc weight").unwrap_err();
        match err {
            NnueError::TruncatedInput { section, .. } => assert_eq!(section, "fc weight"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_encode_decode_i32() {
        let values = vec![0.5, -0.25, 100.0];
        let mut buf = Vec::new();
        let stats = encode_tensor(&mut buf, &values, Dtype::I32, 8128.0).unwrap();
        assert_eq!(stats.clamped, 0);

        let mut r = tracked(buf);
        let t = decode_tensor(&mut r, Dtype::I32, &[3], 8128.0, "test").unwrap();
        for (a, b) in t.iter().zip(values.iter()) {
            assert!((a - b).abs() < 1.0 / 8128.0, "{a} vs {b}");
        }
    }

    #[test]
    fn test_encode_clamps_overflow() {
        // 300 * 127 は i8 範囲外
        let mut buf = Vec::new();
        let stats = encode_tensor(&mut buf, &[300.0, 0.0], Dtype::I8, 127.0).unwrap();
        assert_eq!(stats.clamped, 1);
        // round(300 * 127) = 38100 → 127 にクランプ（幅 37973）
        assert_eq!(stats.max_clamp_error, 37973.0);
        assert_eq!(buf[0] as i8, i8::MAX);
    }

    #[test]
    fn test_transpose() {
        // [2][3] -> [3][2]
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let t = transpose(&data, 2, 3);
        assert_eq!(t, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }

    #[test]
    fn test_strip_and_add_padding() {
        // 論理幅40 → パディング幅64
        let rows = 2;
        let logical = 40;
        let data: Vec<f32> = (0..rows * logical).map(|i| i as f32).collect();
        let padded = add_padding(&data, rows, logical);
        assert_eq!(padded.len(), rows * 64);
        assert_eq!(padded[40], 0.0); // パディング列はゼロ
        assert_eq!(padded[64], 40.0); // 2行目の先頭

        let stripped = strip_padding(&padded, rows, logical);
        assert_eq!(stripped, data);
    }
}
