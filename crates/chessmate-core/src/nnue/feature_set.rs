//! 特徴量セットの識別情報
//!
//! 盤面エンコーディング方式の名前・入力次元・identity hash を束ねる。
//! reader/writer はこの情報からネットワークハッシュを計算し、
//! 非互換なファイルをテンソルのパース前に拒否する。

use super::error::NnueError;

/// 特徴量セット記述子
///
/// 構築後は不変。`identity_hash` は方式の構成から決定論的に導出された
/// 32bit 値で、nnue-pytorch 側の定義と一致している必要がある。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSetDescriptor {
    /// 方式名（登録キー）
    pub name: &'static str,
    /// スパース入力特徴量の総数
    pub input_dimension: usize,
    /// 方式の identity hash
    pub identity_hash: u32,
}

impl FeatureSetDescriptor {
    pub const fn new(name: &'static str, input_dimension: usize, identity_hash: u32) -> Self {
        Self {
            name,
            input_dimension,
            identity_hash,
        }
    }
}

impl std::fmt::Display for FeatureSetDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.name, self.input_dimension)
    }
}

/// HalfKP: 自玉位置 64 × (駒種10 × 64マス + 1) = 41,024 特徴量
pub const HALFKP: FeatureSetDescriptor = FeatureSetDescriptor::new("halfkp", 41_024, 0x5D69_D5B8);

/// 登録済み特徴量セット
static REGISTRY: &[&FeatureSetDescriptor] = &[&HALFKP];

/// 名前から特徴量セットを引く
pub fn by_name(name: &str) -> Result<&'static FeatureSetDescriptor, NnueError> {
    REGISTRY
        .iter()
        .find(|fs| fs.name == name)
        .copied()
        .ok_or_else(|| NnueError::UnknownFeatureSet {
            name: name.to_string(),
        })
}
