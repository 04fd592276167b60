//! NNUE 学習用のデータ準備・特徴量抽出ツール群
//!
//! - [`engine`]: 外部 UCI エンジンをサブプロセスとして扱う解析クライアント
//! - [`features`]: 盤面から学習信号を作る（HalfKP / マテリアル / PV）
//! - [`dataset`]: 棋譜の再生と学習バッチ用インデックス表

pub mod dataset;
pub mod engine;
pub mod features;
