//! デコード済み重みによる順伝播
//!
//! スパースな特徴量インデックス（両視点）を受け取り、
//! Feature Transformer → clipped ReLU → FC スタックでスカラー評価を出す。
//! 学習用の埋め込み（出力層手前の活性）も取り出せる。

use super::spec::ArchitectureSpec;
use super::weights::WeightSet;

/// 評価ネットワーク
///
/// [`WeightSet`] は全ハッシュ検証済みの完全な状態でのみ構築されるため、
/// ここでは形状の再検証はしない。
pub struct Network {
    spec: ArchitectureSpec,
    weights: WeightSet,
}

impl Network {
    pub fn new(spec: ArchitectureSpec, weights: WeightSet) -> Self {
        debug_assert!(weights.validate(&spec).is_ok());
        Self { spec, weights }
    }

    pub fn spec(&self) -> &ArchitectureSpec {
        &self.spec
    }

    pub fn weights(&self) -> &WeightSet {
        &self.weights
    }

    /// 片視点ぶんの Feature Transformer 出力（bias + アクティブ特徴の列和）
    fn transform_one(&self, active: &[usize]) -> Vec<f32> {
        let ft = &self.weights.feature_transformer;
        let mut acc = ft.bias.clone();
        for &feature in active {
            debug_assert!(feature < ft.input_size);
            // weight は [l1][input_dim] 行優先なので列アクセスになる
            for (o, a) in acc.iter_mut().enumerate() {
                *a += ft.weight[o * ft.input_size + feature];
            }
        }
        acc
    }

    /// 両視点の盤面エンコーディングを密な埋め込みへ変換する
    ///
    /// 手番側 `current`、相手側 `other` のアクティブ特徴インデックスを受け、
    /// 連結して [0, 1] にクランプした `2*l1` 次元ベクトルを返す。
    pub fn transform(&self, current: &[usize], other: &[usize]) -> Vec<f32> {
        let mut out = self.transform_one(current);
        out.extend(self.transform_one(other));
        for v in out.iter_mut() {
            *v = v.clamp(0.0, 1.0);
        }
        out
    }

    /// 出力層手前の活性（学習用の盤面埋め込み）
    pub fn embed(&self, current: &[usize], other: &[usize]) -> Vec<f32> {
        let mut x = self.transform(current, other);
        // 隠れFC層のみ（最後の層が出力層）
        if let Some((_, hidden)) = self.weights.layers.split_last() {
            for layer in hidden {
                x = forward_clamped(layer, &x);
            }
        }
        x
    }

    /// スカラー評価値
    pub fn evaluate(&self, current: &[usize], other: &[usize]) -> f32 {
        let x = self.embed(current, other);
        let Some((output, _)) = self.weights.layers.split_last() else {
            return 0.0;
        };
        let mut v = output.bias[0];
        for (w, xi) in output.row(0).iter().zip(x.iter()) {
            v += w * xi;
        }
        v
    }
}

/// 線形変換 + clipped ReLU [0, 1]
fn forward_clamped(layer: &super::weights::Linear, x: &[f32]) -> Vec<f32> {
    debug_assert_eq!(x.len(), layer.input_size);
    let mut out = Vec::with_capacity(layer.output_size);
    for o in 0..layer.output_size {
        let mut v = layer.bias[o];
        for (w, xi) in layer.row(o).iter().zip(x.iter()) {
            v += w * xi;
        }
        out.push(v.clamp(0.0, 1.0));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nnue::feature_set::FeatureSetDescriptor;
    use crate::nnue::weights::Linear;

    fn tiny_spec() -> ArchitectureSpec {
        let fs = FeatureSetDescriptor::new("tiny", 8, 0xDEAD_BEEF);
        ArchitectureSpec::new(fs, 4, 2, 2)
    }

    /// 手計算で検証できる小さい重み
    fn hand_network() -> Network {
        let spec = tiny_spec();
        let ft_shape = spec.feature_transformer_shape();
        // 特徴 f が出力 o に 0.1*(o+1) を足す（f=0 の列のみ非ゼロ）
        let mut ft_weight = vec![0.0f32; ft_shape.input_size * ft_shape.output_size];
        for o in 0..ft_shape.output_size {
            ft_weight[o * ft_shape.input_size] = 0.1 * (o + 1) as f32;
        }
        let ft = Linear::new(
            ft_shape.input_size,
            ft_shape.output_size,
            ft_weight,
            vec![0.0; ft_shape.output_size],
        );

        let layers = spec
            .fc_shapes()
            .iter()
            .map(|s| {
                // 恒等に近い固定重み: 全要素 1/input、bias 0
                Linear::new(
                    s.input_size,
                    s.output_size,
                    vec![1.0 / s.input_size as f32; s.input_size * s.output_size],
                    vec![0.0; s.output_size],
                )
            })
            .collect();

        Network::new(
            spec,
            WeightSet {
                feature_transformer: ft,
                layers,
                description: String::new(),
            },
        )
    }

    #[test]
    fn test_transform_clamps() {
        let net = hand_network();
        // 特徴0を10回アクティブにはできないが、視点ごとに1回ずつ
        let t = net.transform(&[0], &[]);
        assert_eq!(t.len(), 8); // 2 * l1
        // current 側: [0.1, 0.2, 0.3, 0.4], other 側: 全ゼロ
        assert!((t[0] - 0.1).abs() < 1e-6);
        assert!((t[3] - 0.4).abs() < 1e-6);
        assert_eq!(&t[4..], &[0.0; 4]);
    }

    #[test]
    fn test_evaluate_hand_computed() {
        let net = hand_network();
        let v = net.evaluate(&[0], &[]);
        // transform = [0.1,0.2,0.3,0.4,0,0,0,0] 平均 0.125
        // l1: 各出力 0.125、l2: 各出力 0.125、output: 0.125
        assert!((v - 0.125).abs() < 1e-6);
    }

    #[test]
    fn test_empty_features_bias_only() {
        let net = hand_network();
        let v = net.evaluate(&[], &[]);
        assert_eq!(v, 0.0);
    }
}
