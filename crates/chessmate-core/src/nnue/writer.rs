//! .nnue ファイルの書き出し
//!
//! reader の逆変換。同じヘッダ・ハッシュ・セクション順を再現する。
//! 量子化粒度に乗っている値を与えれば decode → encode はバイト同一になる。

use std::io::Write;

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use super::codec::{self, Dtype, QuantStats};
use super::constants::{
    ACTIVATION_SCALE, FT_SCALE, HIDDEN_BIAS_SCALE, MAX_DESC_LEN, NNUE_VERSION, OUTPUT_BIAS_SCALE,
};
use super::error::NnueError;
use super::hash;
use super::spec::ArchitectureSpec;
use super::weights::{Linear, WeightSet};

/// [`WeightSet`] を .nnue 形式でエンコードする
///
/// クランプ（量子化オーバーフロー）は診断として返すだけで中断しない。
pub fn write_nnue<W: Write>(
    writer: &mut W,
    spec: &ArchitectureSpec,
    weights: &WeightSet,
) -> Result<QuantStats, NnueError> {
    weights.validate(spec)?;
    // reader が拒否するファイルを作らない（長さ上限は読み書き対称）
    let desc = weights.description.as_bytes();
    if desc.len() > MAX_DESC_LEN {
        return Err(NnueError::InvalidDescriptionLength {
            len: desc.len(),
            max: MAX_DESC_LEN,
        });
    }
    let mut stats = QuantStats::default();

    // 1. ヘッダ
    writer.write_u32::<LittleEndian>(NNUE_VERSION)?;
    writer.write_u32::<LittleEndian>(hash::network_hash(spec))?;
    writer.write_u32::<LittleEndian>(desc.len() as u32)?;
    writer.write_all(desc)?;

    // 2. Feature Transformer
    writer.write_u32::<LittleEndian>(hash::ft_hash(spec))?;
    stats.merge(write_feature_transformer(
        writer,
        &weights.feature_transformer,
    )?);

    // 3. FC 層
    writer.write_u32::<LittleEndian>(hash::fc_hash(spec))?;
    for (layer, shape) in weights.layers.iter().zip(spec.fc_shapes()) {
        let bias_scale = if shape.is_output {
            OUTPUT_BIAS_SCALE
        } else {
            HIDDEN_BIAS_SCALE
        };
        stats.merge(write_fc_layer(writer, layer, bias_scale)?);
    }

    if stats.clamped > 0 {
        debug!("quantization clamped {} values", stats.clamped);
    }
    Ok(stats)
}

/// クランプ幅が許容値を超えたら `QuantizationOverflow` で失敗する
///
/// `tolerance` は量子化整数単位の許容クランプ幅。0.0 ならクランプを
/// 1つも許さない。
pub fn write_nnue_with_tolerance<W: Write>(
    writer: &mut W,
    spec: &ArchitectureSpec,
    weights: &WeightSet,
    tolerance: f32,
) -> Result<QuantStats, NnueError> {
    let stats = write_nnue(writer, spec, weights)?;
    if stats.clamped > 0 && stats.max_clamp_error > tolerance {
        return Err(NnueError::QuantizationOverflow {
            dtype: Dtype::I8,
            clamped: stats.clamped,
        });
    }
    Ok(stats)
}

/// クランプが1つでも起これば `QuantizationOverflow` で失敗する厳格版
pub fn write_nnue_strict<W: Write>(
    writer: &mut W,
    spec: &ArchitectureSpec,
    weights: &WeightSet,
) -> Result<(), NnueError> {
    write_nnue_with_tolerance(writer, spec, weights, 0.0).map(|_| ())
}

/// メモリ上の `[l1][input_dim]` をファイル上の `[input_dim][l1]` に転置して書く
fn write_feature_transformer<W: Write>(
    writer: &mut W,
    layer: &Linear,
) -> Result<QuantStats, NnueError> {
    let mut stats = codec::encode_tensor(writer, &layer.bias, Dtype::I16, FT_SCALE)?;
    let on_disk = codec::transpose(&layer.weight, layer.output_size, layer.input_size);
    stats.merge(codec::encode_tensor(writer, &on_disk, Dtype::I16, FT_SCALE)?);
    Ok(stats)
}

/// 入力次元を32の倍数へゼロ埋めして書く
fn write_fc_layer<W: Write>(
    writer: &mut W,
    layer: &Linear,
    bias_scale: f32,
) -> Result<QuantStats, NnueError> {
    let weight_scale = bias_scale / ACTIVATION_SCALE;
    let mut stats = codec::encode_tensor(writer, &layer.bias, Dtype::I32, bias_scale)?;
    let padded = codec::add_padding(&layer.weight, layer.output_size, layer.input_size);
    stats.merge(codec::encode_tensor(writer, &padded, Dtype::I8, weight_scale)?);
    Ok(stats)
}
