//! chessmate-core
//!
//! NNUE学習データ準備のためのコアライブラリ。
//!
//! 中心は nnue-pytorch 互換の量子化済み重みファイル（.nnue）の
//! 読み書きコーデック。ヘッダ検証・セクションハッシュ・量子化テンソルの
//! デコード/エンコードをビット厳密に扱う。
//!
//! - [`nnue::reader`] / [`nnue::writer`]: .nnue ファイルの読み書き
//! - [`nnue::checkpoint`]: float32 チェックポイント形式（変換先）
//! - [`nnue::feature_set`]: 特徴量セットの識別情報（HalfKP 等）
//! - [`nnue::network`]: デコード済み重みでの順伝播

pub mod nnue;
