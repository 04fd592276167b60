//! 駒割りスコア
//!
//! 固定の駒価値 (P=1, N=3, B=3, R=5, Q=9, K=0) による単純な駒割り。
//! 正の値は白有利。視点変換は符号反転のみ。

use shakmaty::{Board, ByRole, Color, Role};

/// 駒1種あたりの価値
pub const fn piece_value(role: Role) -> i32 {
    match role {
        Role::Pawn => 1,
        Role::Knight | Role::Bishop => 3,
        Role::Rook => 5,
        Role::Queen => 9,
        Role::King => 0,
    }
}

fn side_total(counts: &ByRole<u8>) -> i32 {
    counts.pawn as i32 * piece_value(Role::Pawn)
        + counts.knight as i32 * piece_value(Role::Knight)
        + counts.bishop as i32 * piece_value(Role::Bishop)
        + counts.rook as i32 * piece_value(Role::Rook)
        + counts.queen as i32 * piece_value(Role::Queen)
}

/// 白視点の駒割りスコア
pub fn material_score(board: &Board) -> i32 {
    let m = board.material();
    side_total(&m.white) - side_total(&m.black)
}

/// `pov` 視点の駒割りスコア
pub fn pov_material(board: &Board, pov: Color) -> i32 {
    match pov {
        Color::White => material_score(board),
        Color::Black => -material_score(board),
    }
}
