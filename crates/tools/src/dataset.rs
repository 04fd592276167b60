//! 棋譜の再生と学習バッチ用インデックス表
//!
//! 棋譜は SAN の空白区切り列として渡される。不正な SAN や非合法手は
//! データ不備としてエラーにする（黙った読み飛ばしはしない）。

use anyhow::{Context, Result, anyhow};
use shakmaty::san::SanPlus;
use shakmaty::{Chess, Position};

/// SAN 手順を初期局面から再生する
///
/// `ply_limit` を指定すると先頭からそのプライ数だけ適用する。
pub fn replay_san(moves: &str, ply_limit: Option<usize>) -> Result<Chess> {
    let mut pos = Chess::default();
    let limit = ply_limit.unwrap_or(usize::MAX);
    for (ply, token) in moves.split_whitespace().take(limit).enumerate() {
        let san: SanPlus = token
            .parse()
            .with_context(|| format!("bad san {token:?} at ply {ply}"))?;
        let m = san
            .san
            .to_move(&pos)
            .with_context(|| format!("illegal move {token} at ply {ply}"))?;
        pos = pos
            .play(&m)
            .map_err(|_| anyhow!("illegal move {token} at ply {ply}"))?;
    }
    Ok(pos)
}

/// `(game, ply)` のインデックス表を作る
///
/// `lengths[g]` はゲーム g のプライ数。欠損 (`None`) のゲームは
/// 表に含めない。1局面 = 表の1行で、学習バッチのランダムアクセスに使う。
pub fn build_index_table(lengths: &[Option<u32>]) -> Vec<(u32, u32)> {
    let mut table = Vec::new();
    for (game, len) in lengths.iter().enumerate() {
        if let Some(len) = len {
            for ply in 0..*len {
                table.push((game as u32, ply));
            }
        }
    }
    table
}
