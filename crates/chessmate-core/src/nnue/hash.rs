//! セクションハッシュの計算
//!
//! 構造フィンガープリントであって暗号学的ダイジェストではない。
//! レイヤサイズ・特徴量セットの組み合わせが一致しないファイルを
//! テンソルのパース前に弾くためだけに存在する。
//!
//! 全ての期待値は静的なレイヤ構成表（[`ArchitectureSpec`]）から計算する。
//! ファイルから読んだ値と混同しないこと。

use super::spec::ArchitectureSpec;

/// InputSlice 層のハッシュシード（nnue-pytorch 互換）
const INPUT_SLICE_HASH: u32 = 0xEC42_E90D;

/// AffineTransform 層のハッシュシード
const AFFINE_HASH: u32 = 0xCC03_DAE4;

/// ClippedReLU 層のハッシュ加算値
const CLIPPED_RELU_HASH: u32 = 0x538D_24C7;

/// FC 部全体のハッシュ
///
/// レイヤをファイル順に畳み込む。前段のハッシュを `>> 1` と `<< 31` で
/// 回転混合するため、合成は順序依存になる。
pub fn fc_hash(spec: &ArchitectureSpec) -> u32 {
    let mut prev = INPUT_SLICE_HASH ^ (2 * spec.l1) as u32;
    for layer in spec.fc_shapes() {
        let mut h = AFFINE_HASH.wrapping_add(layer.output_size as u32);
        h ^= prev >> 1;
        h ^= prev.wrapping_shl(31);
        if !layer.is_output {
            // 隠れ層の後には ClippedReLU が続く
            h = h.wrapping_add(CLIPPED_RELU_HASH);
        }
        prev = h;
    }
    prev
}

/// Feature Transformer セクションの期待ハッシュ
pub fn ft_hash(spec: &ArchitectureSpec) -> u32 {
    spec.feature_set.identity_hash ^ (2 * spec.l1) as u32
}

/// ヘッダのネットワークハッシュ
///
/// 固定順の XOR 合成: fc_hash ^ feature_set hash ^ 2*L1
pub fn network_hash(spec: &ArchitectureSpec) -> u32 {
    fc_hash(spec) ^ spec.feature_set.identity_hash ^ (2 * spec.l1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nnue::feature_set::{FeatureSetDescriptor, HALFKP};

    #[test]
    fn test_hashes_deterministic() {
        let spec = ArchitectureSpec::standard(HALFKP);
        assert_eq!(fc_hash(&spec), fc_hash(&spec));
        // network_hash = fc ^ fs ^ 2L1, ft = fs ^ 2L1 なので fc ^ ft ^ network = 0
        assert_eq!(fc_hash(&spec) ^ ft_hash(&spec) ^ network_hash(&spec), 0);
    }

    #[test]
    fn test_hash_sensitive_to_feature_set() {
        let a = ArchitectureSpec::standard(HALFKP);
        let other = FeatureSetDescriptor::new("other", 41_024, 0x1234_5678);
        let b = ArchitectureSpec::standard(other);
        assert_ne!(network_hash(&a), network_hash(&b));
        assert_ne!(ft_hash(&a), ft_hash(&b));
        // fc_hash は特徴量セットに依存しない
        assert_eq!(fc_hash(&a), fc_hash(&b));
    }

    #[test]
    fn test_hash_sensitive_to_layer_sizes() {
        let a = ArchitectureSpec::standard(HALFKP);
        let b = ArchitectureSpec::new(HALFKP, 256, 32, 64);
        let c = ArchitectureSpec::new(HALFKP, 512, 32, 32);
        assert_ne!(fc_hash(&a), fc_hash(&b));
        assert_ne!(fc_hash(&a), fc_hash(&c));
        assert_ne!(ft_hash(&a), ft_hash(&c));
    }

    #[test]
    fn test_fc_hash_order_sensitive() {
        // L2/L3 を入れ替えると別のハッシュになる（XOR 単純合成ではない）
        let a = ArchitectureSpec::new(HALFKP, 256, 16, 64);
        let b = ArchitectureSpec::new(HALFKP, 256, 64, 16);
        assert_ne!(fc_hash(&a), fc_hash(&b));
    }
}
