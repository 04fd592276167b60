//! 盤面から学習信号を作る特徴量抽出
//!
//! - [`halfkp`]: スパース盤面エンコーディングのアクティブ特徴量インデックス
//! - [`material`]: 駒割りスコア（白正、視点変換付き）
//! - [`pv`]: PV を再生して駒割りスコア列を作る

pub mod halfkp;
pub mod material;
pub mod pv;
