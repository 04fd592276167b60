//! ネットワークアーキテクチャ仕様
//!
//! レイヤ構成はビルド時に既知の静的な表であり、ファイルからは発見しない。
//! ファイル側の値はハッシュ照合によってのみ突き合わせる。

use super::constants::{L1, L2, L3};
use super::feature_set::FeatureSetDescriptor;

/// 1つの線形層の形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerShape {
    pub input_size: usize,
    pub output_size: usize,
    /// 両視点の盤面エンコーディングを受ける最初の層かどうか
    pub is_feature_transformer: bool,
    /// スカラーを出力する最終層かどうか
    pub is_output: bool,
}

/// アーキテクチャ仕様
///
/// 特徴量セットと各層サイズでネットワークを一意に識別する。
/// 既定構成は Feature Transformer → L1=256 → L2=32 → L3=32 → 1。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchitectureSpec {
    pub feature_set: FeatureSetDescriptor,
    pub l1: usize,
    pub l2: usize,
    pub l3: usize,
}

impl ArchitectureSpec {
    pub const fn new(feature_set: FeatureSetDescriptor, l1: usize, l2: usize, l3: usize) -> Self {
        Self {
            feature_set,
            l1,
            l2,
            l3,
        }
    }

    /// 既定の固定構成（256-32-32）
    pub const fn standard(feature_set: FeatureSetDescriptor) -> Self {
        Self::new(feature_set, L1, L2, L3)
    }

    /// Feature Transformer の形状
    pub fn feature_transformer_shape(&self) -> LayerShape {
        LayerShape {
            input_size: self.feature_set.input_dimension,
            output_size: self.l1,
            is_feature_transformer: true,
            is_output: false,
        }
    }

    /// FC層の形状をファイル順（L1→L2, L2→L3, L3→出力）で返す
    ///
    /// FC部の入力は両視点の連結なので先頭層の入力は `2 * l1`。
    pub fn fc_shapes(&self) -> [LayerShape; 3] {
        [
            LayerShape {
                input_size: 2 * self.l1,
                output_size: self.l2,
                is_feature_transformer: false,
                is_output: false,
            },
            LayerShape {
                input_size: self.l2,
                output_size: self.l3,
                is_feature_transformer: false,
                is_output: false,
            },
            LayerShape {
                input_size: self.l3,
                output_size: 1,
                is_feature_transformer: false,
                is_output: true,
            },
        ]
    }

    /// アーキテクチャ名を生成
    ///
    /// 例: "halfkp[41024]-256-32-32"
    pub fn name(&self) -> String {
        format!("{}-{}-{}-{}", self.feature_set, self.l1, self.l2, self.l3)
    }
}

impl std::fmt::Display for ArchitectureSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nnue::feature_set::HALFKP;

    #[test]
    fn test_standard_shapes() {
        let spec = ArchitectureSpec::standard(HALFKP);
        let ft = spec.feature_transformer_shape();
        assert_eq!(ft.input_size, 41_024);
        assert_eq!(ft.output_size, 256);
        assert!(ft.is_feature_transformer);

        let fc = spec.fc_shapes();
        assert_eq!((fc[0].input_size, fc[0].output_size), (512, 32));
        assert_eq!((fc[1].input_size, fc[1].output_size), (32, 32));
        assert_eq!((fc[2].input_size, fc[2].output_size), (32, 1));
        assert!(fc[2].is_output);
        assert!(!fc[1].is_output);
    }

    #[test]
    fn test_architecture_name() {
        let spec = ArchitectureSpec::standard(HALFKP);
        assert_eq!(spec.name(), "halfkp[41024]-256-32-32");
    }
}
