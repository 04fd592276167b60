//! HalfKP アクティブ特徴量インデックス
//!
//! 自玉の位置と玉以外の駒の (駒種, 色, マス) を組にした
//! スパースエンコーディング。インデックス計算は nnue-pytorch の
//! halfkp 定義と一致させてある（プレーン0は未使用のダミー）。
//!
//! 黒視点はマス番号の `^ 63`（180度回転）で正規化する。

use shakmaty::{Board, Chess, Color, Position, Role, Square};

/// 駒プレーン数: 駒種5 × 両色 × 64マス + ダミー1
pub const NUM_PLANES: usize = 641;

/// 入力特徴量の総数 (64 × 641)
pub const INPUT_DIMENSION: usize = 64 * NUM_PLANES;

/// 視点に応じたマスの正規化
const fn orient(pov: Color, sq: Square) -> usize {
    match pov {
        Color::White => sq as usize,
        Color::Black => sq as usize ^ 63,
    }
}

/// 1駒ぶんの特徴量インデックス
///
/// 玉は特徴量にならないため `None`。
pub fn halfkp_index(
    pov: Color,
    king: Square,
    sq: Square,
    role: Role,
    color: Color,
) -> Option<usize> {
    if role == Role::King {
        return None;
    }
    let p_idx = (role as usize - 1) * 2 + usize::from(color != pov);
    Some(1 + orient(pov, sq) + p_idx * 64 + orient(pov, king) * NUM_PLANES)
}

/// 指定視点のアクティブ特徴量インデックス（昇順）
pub fn active_features(board: &Board, pov: Color) -> Vec<usize> {
    let Some(king) = board.king_of(pov) else {
        debug_assert!(false, "position without a {pov:?} king");
        return Vec::new();
    };
    let mut features = Vec::with_capacity(30);
    for sq in board.occupied() {
        if let Some(piece) = board.piece_at(sq) {
            if let Some(idx) = halfkp_index(pov, king, sq, piece.role, piece.color) {
                features.push(idx);
            }
        }
    }
    features.sort_unstable();
    features
}

/// 手番側を先にした両視点の特徴量ペア `(current, other)`
pub fn board_features(pos: &Chess) -> (Vec<usize>, Vec<usize>) {
    let white = active_features(pos.board(), Color::White);
    let black = active_features(pos.board(), Color::Black);
    match pos.turn() {
        Color::White => (white, black),
        Color::Black => (black, white),
    }
}
