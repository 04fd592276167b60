//! デコード済み重みの保持構造体
//!
//! 全テンソルは行優先の `Vec<f32>`。重み行列はメモリ上では常に
//! 出力次元が先頭（`[out][in]`）。Feature Transformer のファイル上の
//! 転置はデコード時に解消済み。

use super::error::NnueError;
use super::spec::ArchitectureSpec;

/// 線形層1つぶんの重みと bias
#[derive(Debug, Clone, PartialEq)]
pub struct Linear {
    pub input_size: usize,
    pub output_size: usize,
    /// `[output_size][input_size]` 行優先
    pub weight: Vec<f32>,
    /// `[output_size]`
    pub bias: Vec<f32>,
}

impl Linear {
    pub fn new(input_size: usize, output_size: usize, weight: Vec<f32>, bias: Vec<f32>) -> Self {
        debug_assert_eq!(weight.len(), input_size * output_size);
        debug_assert_eq!(bias.len(), output_size);
        Self {
            input_size,
            output_size,
            weight,
            bias,
        }
    }

    /// `weight` の1行（出力ニューロン1つぶんの入力重み）
    #[inline]
    pub fn row(&self, out: usize) -> &[f32] {
        &self.weight[out * self.input_size..(out + 1) * self.input_size]
    }
}

/// 完全にデコードされたネットワーク重み一式
///
/// reader が全セクションを消費し全ハッシュ照合を通した場合にのみ構築される。
/// 部分的に読めた状態が呼び出し側に見えることはない。
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSet {
    /// Feature Transformer: `[l1][input_dimension]` + bias `[l1]`
    pub feature_transformer: Linear,
    /// FC層、ファイル順（L1→L2, L2→L3, L3→出力）
    pub layers: Vec<Linear>,
    /// ヘッダの自由記述メタデータ（意味解釈はしない）
    pub description: String,
}

impl WeightSet {
    /// 各テンソルの形状がアーキテクチャ仕様と一致するか検証する
    pub fn validate(&self, spec: &ArchitectureSpec) -> Result<(), NnueError> {
        let ft = spec.feature_transformer_shape();
        if self.feature_transformer.input_size != ft.input_size
            || self.feature_transformer.output_size != ft.output_size
        {
            return Err(NnueError::ShapeMismatch {
                section: "feature transformer",
                got: self.feature_transformer.weight.len(),
                expected: ft.input_size * ft.output_size,
            });
        }
        let fc = spec.fc_shapes();
        if self.layers.len() != fc.len() {
            return Err(NnueError::ShapeMismatch {
                section: "fc layers",
                got: self.layers.len(),
                expected: fc.len(),
            });
        }
        for (layer, shape) in self.layers.iter().zip(fc.iter()) {
            if layer.input_size != shape.input_size || layer.output_size != shape.output_size {
                return Err(NnueError::ShapeMismatch {
                    section: "fc layer",
                    got: layer.weight.len(),
                    expected: shape.input_size * shape.output_size,
                });
            }
        }
        Ok(())
    }
}
