//! .nnue ファイルの読み込み
//!
//! 厳密に逐次のステートマシン。後戻りはしない。どのステップで失敗しても
//! 部分的な [`WeightSet`] は外に出ない（全テンソルをローカルに組み立てて
//! 最後にまとめて構築する）。

use std::io::Read;

use log::debug;

use super::codec::{self, Dtype, TrackedReader};
use super::constants::{
    ACTIVATION_SCALE, FT_SCALE, HIDDEN_BIAS_SCALE, MAX_DESC_LEN, NNUE_VERSION, OUTPUT_BIAS_SCALE,
    pad32,
};
use super::error::NnueError;
use super::hash;
use super::spec::{ArchitectureSpec, LayerShape};
use super::weights::{Linear, WeightSet};

/// .nnue ストリームをデコードする（末尾の余剰バイトは許容）
pub fn read_nnue<R: Read>(
    reader: &mut R,
    spec: &ArchitectureSpec,
) -> Result<WeightSet, NnueError> {
    let mut r = TrackedReader::new(reader);
    read_sections(&mut r, spec)
}

/// .nnue ストリームをデコードする（末尾に未消費バイトが残れば `TrailingData`）
pub fn read_nnue_strict<R: Read>(
    reader: &mut R,
    spec: &ArchitectureSpec,
) -> Result<WeightSet, NnueError> {
    let mut r = TrackedReader::new(reader);
    let weights = read_sections(&mut r, spec)?;
    let remaining = r.drain()?;
    if remaining > 0 {
        return Err(NnueError::TrailingData { remaining });
    }
    Ok(weights)
}

fn read_sections<R: Read>(
    r: &mut TrackedReader<&mut R>,
    spec: &ArchitectureSpec,
) -> Result<WeightSet, NnueError> {
    // 1. ヘッダ: version / network hash / description
    let stored_version = r.read_u32("header")?;
    if stored_version != NNUE_VERSION {
        return Err(NnueError::UnsupportedVersion {
            expected: NNUE_VERSION,
            stored: stored_version,
        });
    }

    let expected_network = hash::network_hash(spec);
    let stored_network = r.read_u32("header")?;
    if stored_network != expected_network {
        return Err(NnueError::ArchitectureMismatch {
            arch: spec.name(),
            expected: expected_network,
            stored: stored_network,
        });
    }

    let desc_len = r.read_u32("header")? as usize;
    if desc_len > MAX_DESC_LEN {
        return Err(NnueError::InvalidDescriptionLength {
            len: desc_len,
            max: MAX_DESC_LEN,
        });
    }
    let mut desc = vec![0u8; desc_len];
    r.read_exact(&mut desc, "description")?;
    let description = String::from_utf8_lossy(&desc).into_owned();
    debug!("nnue description: {description}");

    // 2. Feature Transformer セクション
    let expected_ft = hash::ft_hash(spec);
    let stored_ft = r.read_u32("feature transformer")?;
    if stored_ft != expected_ft {
        return Err(NnueError::SectionHashMismatch {
            section: "feature transformer",
            expected: expected_ft,
            stored: stored_ft,
        });
    }
    let feature_transformer = read_feature_transformer(r, &spec.feature_transformer_shape())?;

    // 3. FC セクション: 期待ハッシュは静的なレイヤ構成表から計算する
    let expected_fc = hash::fc_hash(spec);
    let stored_fc = r.read_u32("fc layers")?;
    if stored_fc != expected_fc {
        return Err(NnueError::SectionHashMismatch {
            section: "fc layers",
            expected: expected_fc,
            stored: stored_fc,
        });
    }

    let mut layers = Vec::with_capacity(3);
    for shape in spec.fc_shapes() {
        layers.push(read_fc_layer(r, &shape)?);
    }

    debug!(
        "decoded {} at {} bytes",
        spec.name(),
        r.offset()
    );

    Ok(WeightSet {
        feature_transformer,
        layers,
        description,
    })
}

/// Feature Transformer のテンソル対を読む
///
/// bias: i16 / 127.0, 形状 `[l1]`。
/// weight: i16 / 127.0, ファイル上は `[input_dim][l1]` で格納されているため
/// スケール適用後に `[l1][input_dim]` へ転置する。
fn read_feature_transformer<R: Read>(
    r: &mut TrackedReader<&mut R>,
    shape: &LayerShape,
) -> Result<Linear, NnueError> {
    let bias = codec::decode_tensor(r, Dtype::I16, &[shape.output_size], FT_SCALE, "ft bias")?;
    let on_disk = codec::decode_tensor(
        r,
        Dtype::I16,
        &[shape.input_size, shape.output_size],
        FT_SCALE,
        "ft weight",
    )?;
    let weight = codec::transpose(&on_disk, shape.input_size, shape.output_size);
    Ok(Linear::new(shape.input_size, shape.output_size, weight, bias))
}

/// FC層1つぶんのテンソル対を読む
///
/// bias: i32、スケールは隠れ層 8128.0 / 出力層 9600.0。
/// weight: i8、スケールは bias_scale / 127.0。入力次元は32の倍数へ
/// パディングされて格納されているため、論理幅に切り詰める。
fn read_fc_layer<R: Read>(
    r: &mut TrackedReader<&mut R>,
    shape: &LayerShape,
) -> Result<Linear, NnueError> {
    let bias_scale = if shape.is_output {
        OUTPUT_BIAS_SCALE
    } else {
        HIDDEN_BIAS_SCALE
    };
    let weight_scale = bias_scale / ACTIVATION_SCALE;

    let bias = codec::decode_tensor(r, Dtype::I32, &[shape.output_size], bias_scale, "fc bias")?;
    let padded = codec::decode_tensor(
        r,
        Dtype::I8,
        &[shape.output_size, pad32(shape.input_size)],
        weight_scale,
        "fc weight",
    )?;
    let weight = codec::strip_padding(&padded, shape.output_size, shape.input_size);
    Ok(Linear::new(shape.input_size, shape.output_size, weight, bias))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nnue::feature_set::FeatureSetDescriptor;
    use std::io::Cursor;

    fn tiny_spec() -> ArchitectureSpec {
        let fs = FeatureSetDescriptor::new("tiny", 8, 0xDEAD_BEEF);
        ArchitectureSpec::new(fs, 4, 2, 2)
    }

    /// ゼロ重みの正しいファイルをバイト列で組み立てる
    fn build_zero_file(spec: &ArchitectureSpec) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&NNUE_VERSION.to_le_bytes());
        buf.extend_from_slice(&hash::network_hash(spec).to_le_bytes());
        let desc = b"test net";
        buf.extend_from_slice(&(desc.len() as u32).to_le_bytes());
        buf.extend_from_slice(desc);

        // FT: hash + i16 bias[l1] + i16 weight[input][l1]
        buf.extend_from_slice(&hash::ft_hash(spec).to_le_bytes());
        buf.extend(std::iter::repeat_n(0u8, spec.l1 * 2));
        buf.extend(std::iter::repeat_n(
            0u8,
            spec.feature_set.input_dimension * spec.l1 * 2,
        ));

        // FC: hash + 各層 (i32 bias[out] + i8 weight[out][pad32(in)])
        buf.extend_from_slice(&hash::fc_hash(spec).to_le_bytes());
        for shape in spec.fc_shapes() {
            buf.extend(std::iter::repeat_n(0u8, shape.output_size * 4));
            buf.extend(std::iter::repeat_n(
                0u8,
                shape.output_size * pad32(shape.input_size),
            ));
        }
        buf
    }

    #[test]
    fn test_read_zero_file() {
        let spec = tiny_spec();
        let bytes = build_zero_file(&spec);
        let ws = read_nnue_strict(&mut Cursor::new(bytes), &spec).unwrap();
        ws.validate(&spec).unwrap();
        assert_eq!(ws.description, "test net");
        assert_eq!(ws.feature_transformer.weight.len(), 8 * 4);
        assert_eq!(ws.layers.len(), 3);
        assert_eq!(ws.layers[0].input_size, 8); // 2 * l1
        assert_eq!(ws.layers[2].output_size, 1);
    }

    #[test]
    fn test_bad_version() {
        let spec = tiny_spec();
        let mut bytes = build_zero_file(&spec);
        bytes[0] ^= 0xFF;
        let err = read_nnue(&mut Cursor::new(bytes), &spec).unwrap_err();
        assert!(matches!(err, NnueError::UnsupportedVersion { .. }));
    }

    #[test]
    fn test_network_hash_flip_is_architecture_mismatch() {
        // ハッシュのビット反転は汎用パースエラーではなく ArchitectureMismatch
        let spec = tiny_spec();
        let mut bytes = build_zero_file(&spec);
        bytes[4] ^= 0x01;
        let err = read_nnue(&mut Cursor::new(bytes), &spec).unwrap_err();
        match err {
            NnueError::ArchitectureMismatch {
                expected, stored, ..
            } => {
                assert_eq!(expected ^ 1, stored);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_section_hash_mismatch() {
        let spec = tiny_spec();
        let mut bytes = build_zero_file(&spec);
        // FT セクションハッシュの先頭バイト（version 4 + hash 4 + len 4 + desc 8）
        bytes[20] ^= 0x01;
        let err = read_nnue(&mut Cursor::new(bytes), &spec).unwrap_err();
        match err {
            NnueError::SectionHashMismatch { section, .. } => {
                assert_eq!(section, "feature transformer");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_mid_tensor() {
        // ゼロフィルで誤魔化さず TruncatedInput になること
        let spec = tiny_spec();
        let bytes = build_zero_file(&spec);
        let cut = bytes.len() - 5;
        let err = read_nnue(&mut Cursor::new(&bytes[..cut]), &spec).unwrap_err();
        assert!(matches!(err, NnueError::TruncatedInput { .. }));
    }

    #[test]
    fn test_trailing_data_strict() {
        let spec = tiny_spec();
        let mut bytes = build_zero_file(&spec);
        bytes.extend_from_slice(&[0u8; 7]);

        // strict でない読み込みは許容する
        read_nnue(&mut Cursor::new(bytes.clone()), &spec).unwrap();

        let err = read_nnue_strict(&mut Cursor::new(bytes), &spec).unwrap_err();
        match err {
            NnueError::TrailingData { remaining } => assert_eq!(remaining, 7),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_desc_len_bound() {
        let spec = tiny_spec();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&NNUE_VERSION.to_le_bytes());
        bytes.extend_from_slice(&hash::network_hash(&spec).to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        let err = read_nnue(&mut Cursor::new(bytes), &spec).unwrap_err();
        assert!(matches!(err, NnueError::InvalidDescriptionLength { .. }));
    }
}
