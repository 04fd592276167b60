//! float32 チェックポイント形式（.ckpt）
//!
//! 変換 CLI の .nnue 以外の側。量子化を介さない f32 のダンプで、
//! 学習側とのやり取りに使う。独自フォーマット（24バイトヘッダ + f32列）。
//!
//! ```text
//! [magic "CMNN"][u32 version][u32 feature_hash][u32 input_dim][u32 l1][u32 l2][u32 l3]
//! [u32 desc_len][desc bytes]
//! [f32 ft_bias[l1]][f32 ft_weight[l1][input_dim]]
//! [f32 fc_bias[out]][f32 fc_weight[out][in]] × 3
//! ```

use std::io::{Read, Write};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::codec::TrackedReader;
use super::constants::MAX_DESC_LEN;
use super::error::NnueError;
use super::spec::ArchitectureSpec;
use super::weights::{Linear, WeightSet};

/// チェックポイントのマジックナンバー
pub const CKPT_MAGIC: [u8; 4] = *b"CMNN";

/// チェックポイントのバージョン
pub const CKPT_VERSION: u32 = 1;

/// [`WeightSet`] を f32 チェックポイントとして書き出す
pub fn save_checkpoint<W: Write>(
    writer: &mut W,
    spec: &ArchitectureSpec,
    weights: &WeightSet,
) -> Result<(), NnueError> {
    weights.validate(spec)?;
    let desc = weights.description.as_bytes();
    if desc.len() > MAX_DESC_LEN {
        return Err(NnueError::InvalidDescriptionLength {
            len: desc.len(),
            max: MAX_DESC_LEN,
        });
    }

    writer.write_all(&CKPT_MAGIC)?;
    writer.write_u32::<LittleEndian>(CKPT_VERSION)?;
    writer.write_u32::<LittleEndian>(spec.feature_set.identity_hash)?;
    writer.write_u32::<LittleEndian>(spec.feature_set.input_dimension as u32)?;
    writer.write_u32::<LittleEndian>(spec.l1 as u32)?;
    writer.write_u32::<LittleEndian>(spec.l2 as u32)?;
    writer.write_u32::<LittleEndian>(spec.l3 as u32)?;
    writer.write_u32::<LittleEndian>(desc.len() as u32)?;
    writer.write_all(desc)?;

    write_f32s(writer, &weights.feature_transformer.bias)?;
    write_f32s(writer, &weights.feature_transformer.weight)?;
    for layer in &weights.layers {
        write_f32s(writer, &layer.bias)?;
        write_f32s(writer, &layer.weight)?;
    }
    Ok(())
}

/// f32 チェックポイントを読み込む
///
/// ヘッダのアーキテクチャ情報が `spec` と一致しなければ
/// `ArchitectureMismatch` で失敗する。
pub fn load_checkpoint<R: Read>(
    reader: &mut R,
    spec: &ArchitectureSpec,
) -> Result<WeightSet, NnueError> {
    let mut r = TrackedReader::new(reader);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic, "ckpt header")?;
    if magic != CKPT_MAGIC {
        return Err(NnueError::UnsupportedVersion {
            expected: u32::from_le_bytes(CKPT_MAGIC),
            stored: u32::from_le_bytes(magic),
        });
    }
    let version = r.read_u32("ckpt header")?;
    if version != CKPT_VERSION {
        return Err(NnueError::UnsupportedVersion {
            expected: CKPT_VERSION,
            stored: version,
        });
    }

    // 期待値は spec 側、stored はファイル側
    let expected = [
        spec.feature_set.identity_hash,
        spec.feature_set.input_dimension as u32,
        spec.l1 as u32,
        spec.l2 as u32,
        spec.l3 as u32,
    ];
    let mut stored = [0u32; 5];
    for s in stored.iter_mut() {
        *s = r.read_u32("ckpt header")?;
    }
    if stored != expected {
        return Err(NnueError::ArchitectureMismatch {
            arch: spec.name(),
            expected: expected[0],
            stored: stored[0],
        });
    }

    let desc_len = r.read_u32("ckpt header")? as usize;
    if desc_len > MAX_DESC_LEN {
        return Err(NnueError::InvalidDescriptionLength {
            len: desc_len,
            max: MAX_DESC_LEN,
        });
    }
    let mut desc = vec![0u8; desc_len];
    r.read_exact(&mut desc, "ckpt description")?;

    let ft_shape = spec.feature_transformer_shape();
    let ft_bias = read_f32s(&mut r, ft_shape.output_size, "ckpt ft bias")?;
    let ft_weight = read_f32s(
        &mut r,
        ft_shape.input_size * ft_shape.output_size,
        "ckpt ft weight",
    )?;

    let mut layers = Vec::with_capacity(3);
    for shape in spec.fc_shapes() {
        let bias = read_f32s(&mut r, shape.output_size, "ckpt fc bias")?;
        let weight = read_f32s(
            &mut r,
            shape.input_size * shape.output_size,
            "ckpt fc weight",
        )?;
        layers.push(Linear::new(shape.input_size, shape.output_size, weight, bias));
    }

    Ok(WeightSet {
        feature_transformer: Linear::new(
            ft_shape.input_size,
            ft_shape.output_size,
            ft_weight,
            ft_bias,
        ),
        layers,
        description: String::from_utf8_lossy(&desc).into_owned(),
    })
}

fn write_f32s<W: Write>(writer: &mut W, values: &[f32]) -> Result<(), NnueError> {
    let mut buf = vec![0u8; values.len() * 4];
    LittleEndian::write_f32_into(values, &mut buf);
    writer.write_all(&buf)?;
    Ok(())
}

fn read_f32s<R: Read>(
    r: &mut TrackedReader<&mut R>,
    count: usize,
    section: &'static str,
) -> Result<Vec<f32>, NnueError> {
    let mut buf = vec![0u8; count * 4];
    r.read_exact(&mut buf, section)?;
    let mut out = vec![0.0f32; count];
    LittleEndian::read_f32_into(&buf, &mut out);
    Ok(out)
}
