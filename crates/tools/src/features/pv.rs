//! PV 再生による駒割りスコア列
//!
//! エンジンの最善応手列を局面上で再生し、各プライの駒割りを
//! ルートとの差分（白視点の累積デルタ）として並べる。
//! 学習信号として「この変化でどれだけ駒得するか」を与えるのが目的。

use anyhow::{Context, Result, bail};
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Position};

use super::material::material_score;

/// PV 上の駒割りスコア列の抽出器
///
/// `use_ply` はプライ選択マスク。`scores()` の出力は常に
/// `depth + 1` 要素（先頭はルートで常に 0）で、マスクで外した
/// プライは 0 に落とす。長さを固定にしてバッチ化しやすくしてある。
#[derive(Debug, Clone)]
pub struct MaterialLine {
    depth: usize,
    use_ply: Vec<bool>,
}

impl MaterialLine {
    /// 先頭 `depth` プライをすべて使う
    pub fn with_depth(depth: usize) -> Self {
        Self {
            depth,
            use_ply: vec![true; depth],
        }
    }

    /// 指定した相対プライのみを使う
    ///
    /// `depth` は最大プライ + 1 になる。例: `[0, 1, 5]` →
    /// depth 6, マスク `[T, T, F, F, F, T]`。
    pub fn with_relative_plies(plies: &[usize]) -> Self {
        let depth = plies.iter().max().map_or(0, |&m| m + 1);
        let mut use_ply = vec![false; depth];
        for &p in plies {
            use_ply[p] = true;
        }
        Self { depth, use_ply }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn use_ply(&self) -> &[bool] {
        &self.use_ply
    }

    /// PV を `root` から再生して駒割りデルタ列を返す
    ///
    /// `scores[i]` は i プライ後の白視点駒割りからルートの駒割りを
    /// 引いた値。`scores[0]` はルート自身で常に 0。PV が `depth` より
    /// 短い場合はデータ不備としてエラーにする（不足分の捏造はしない）。
    pub fn scores<S: AsRef<str>>(&self, root: &Chess, pv: &[S]) -> Result<Vec<i32>> {
        if pv.len() < self.depth {
            bail!(
                "pv has {} plies but {} are required",
                pv.len(),
                self.depth
            );
        }

        let base = material_score(root.board());
        let mut scores = Vec::with_capacity(self.depth + 1);
        scores.push(0);

        let mut pos = root.clone();
        for (i, mv) in pv.iter().take(self.depth).enumerate() {
            let mv = mv.as_ref();
            let m = UciMove::from_ascii(mv.as_bytes())
                .with_context(|| format!("bad uci move {mv:?} at pv ply {i}"))?
                .to_move(&pos)
                .with_context(|| format!("illegal pv move {mv} at ply {i}"))?;
            pos = pos
                .play(&m)
                .map_err(|_| anyhow::anyhow!("illegal pv move {mv} at ply {i}"))?;
            let delta = if self.use_ply[i] {
                material_score(pos.board()) - base
            } else {
                0
            };
            scores.push(delta);
        }
        Ok(scores)
    }
}
