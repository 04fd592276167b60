//! 外部 UCI エンジンのサブプロセスクライアント
//!
//! エンジンは明示的に構築・破棄されるリソースハンドルであり、
//! グローバルな暗黙プロセスは持たない。stdout はリーダースレッドが
//! 行単位でチャネルへ流し、呼び出し側は `recv_timeout` で
//! 自前のタイムアウトを課す（エンジン自体は無期限にブロックしうる）。

use std::collections::HashSet;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use log::{debug, warn};
use shakmaty::fen::Fen;
use shakmaty::{Chess, Color, EnPassantMode, Position};
use thiserror::Error;

pub const ENGINE_READY_TIMEOUT: Duration = Duration::from_secs(30);
pub const ENGINE_QUIT_TIMEOUT: Duration = Duration::from_millis(300);
pub const ENGINE_QUIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// mate スコアを有界な数値へ写すときの既定の代替値
pub const DEFAULT_MATE_SCORE: i32 = 318;

#[derive(Debug, Error)]
pub enum EngineError {
    /// プロセスの起動やハンドシェイクに失敗した
    #[error("engine unavailable: {reason}")]
    Unavailable { reason: String },
    /// 課したタイムアウト内に応答が返らなかった
    #[error("engine timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },
    /// エンジンプロセスが予期せず終了した
    #[error("engine exited unexpectedly")]
    Exited,
    /// プロトコル違反（score なしの bestmove など）
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// エンジンが報告する評価値
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// centipawn
    Cp(i32),
    /// N 手詰み（負値は詰まされる側）
    Mate(i32),
}

impl Score {
    /// 有界な数値へ変換する
    ///
    /// mate は `±(mate_score − 手数)` に写す。mate スコアを既定値で
    /// 黙って潰すことはせず、代替値は常に呼び出し側が与える。
    pub fn value(self, mate_score: i32) -> i32 {
        match self {
            Score::Cp(cp) => cp,
            Score::Mate(n) if n > 0 => mate_score - n,
            Score::Mate(n) => -mate_score - n,
        }
    }
}

/// 視点付き評価値
///
/// エンジンの info 行は手番側視点なので、`pov` には解析局面の手番が入る。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PovScore {
    pub score: Score,
    pub pov: Color,
}

impl PovScore {
    pub fn new(score: Score, pov: Color) -> Self {
        Self { score, pov }
    }

    /// `side` 視点の数値を返す（視点が逆なら符号反転）
    pub fn for_side(self, side: Color, mate_score: i32) -> i32 {
        let v = self.score.value(mate_score);
        if side == self.pov { v } else { -v }
    }

    /// 白視点の数値
    pub fn white(self, mate_score: i32) -> i32 {
        self.for_side(Color::White, mate_score)
    }
}

/// 1回の解析結果
#[derive(Debug, Clone)]
pub struct Analysis {
    /// 最善応手列（UCI 表記）
    pub pv: Vec<String>,
    /// 手番側視点の評価値
    pub score: PovScore,
    /// 到達深さ
    pub depth: Option<u32>,
    pub bestmove: String,
    pub elapsed_ms: u64,
}

/// エンジンプロセス起動時の設定
pub struct EngineConfig {
    pub path: PathBuf,
    pub args: Vec<String>,
    pub threads: usize,
    pub hash_mb: u32,
    /// 追加の UCI オプション (name, value)
    pub options: Vec<(String, String)>,
}

impl EngineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            threads: 1,
            hash_mb: 16,
            options: Vec::new(),
        }
    }
}

/// 解析1回あたりの制限
#[derive(Debug, Clone, Copy)]
pub struct AnalysisLimits {
    pub depth: u32,
    /// bestmove を待つ上限。超過時は stop を送り、それでも
    /// 返らなければ [`EngineError::Timeout`]。
    pub timeout: Duration,
}

impl AnalysisLimits {
    pub fn depth(depth: u32) -> Self {
        Self {
            depth,
            timeout: Duration::from_secs(60),
        }
    }
}

/// 1本のエンジンに対する入出力をカプセル化する
#[derive(Debug)]
pub struct EngineProcess {
    child: Child,
    stdin: BufWriter<ChildStdin>,
    rx: Receiver<String>,
    opt_names: HashSet<String>,
    pub label: String,
}

impl EngineProcess {
    /// 起動して `uci`/`isready` ハンドシェイクまで済ませる
    ///
    /// バイナリ欠落はここで [`EngineError::Unavailable`] になる。
    /// 初回使用時まで失敗が遅延することはない。
    pub fn spawn(cfg: &EngineConfig, label: String) -> Result<Self, EngineError> {
        let mut cmd = Command::new(&cfg.path);
        if !cfg.args.is_empty() {
            cmd.args(&cfg.args);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Unavailable {
                reason: format!("failed to spawn {}: {e}", cfg.path.display()),
            })?;
        let stdin = child.stdin.take().ok_or_else(|| EngineError::Unavailable {
            reason: "no stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| EngineError::Unavailable {
            reason: "no stdout".to_string(),
        })?;
        let (tx, rx) = mpsc::channel::<String>();
        std::thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(l) => {
                        if tx.send(l).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        let mut proc = Self {
            child,
            stdin: BufWriter::new(stdin),
            rx,
            opt_names: HashSet::new(),
            label,
        };
        proc.initialize(cfg)?;
        Ok(proc)
    }

    fn initialize(&mut self, cfg: &EngineConfig) -> Result<(), EngineError> {
        self.write_line("uci")?;
        loop {
            let line = self.recv_line(ENGINE_READY_TIMEOUT)?;
            if let Some(rest) = line.strip_prefix("option ") {
                if let Some(name) = parse_option_name(rest) {
                    self.opt_names.insert(name);
                }
            } else if line == "uciok" {
                break;
            }
        }
        self.set_option_if_available("Threads", &cfg.threads.to_string())?;
        self.set_option_if_available("Hash", &cfg.hash_mb.to_string())?;
        for (name, value) in &cfg.options {
            self.set_option_if_available(name, value)?;
        }
        self.sync_ready()?;
        self.write_line("ucinewgame")?;
        Ok(())
    }

    pub fn new_game(&mut self) -> Result<(), EngineError> {
        self.write_line("ucinewgame")?;
        self.sync_ready()
    }

    /// 局面を深さ制限で解析し、最後の info スナップショットと bestmove を返す
    pub fn analyse(
        &mut self,
        pos: &Chess,
        limits: &AnalysisLimits,
    ) -> Result<Analysis, EngineError> {
        let fen = Fen(pos.clone().into_setup(EnPassantMode::Legal));
        self.write_line(&format!("position fen {fen}"))?;
        self.write_line(&format!("go depth {}", limits.depth))?;

        let start = Instant::now();
        // stop 送信後は少しだけ追加で bestmove を待つ
        let hard_limit = limits.timeout + limits.timeout / 2;
        let mut stop_sent = false;
        let mut snapshot = InfoSnapshot::default();

        loop {
            let elapsed = start.elapsed();
            let deadline = if stop_sent { hard_limit } else { limits.timeout };
            if elapsed >= deadline {
                if !stop_sent {
                    self.write_line("stop")?;
                    stop_sent = true;
                    continue;
                }
                return Err(EngineError::Timeout {
                    elapsed_ms: elapsed.as_millis() as u64,
                });
            }

            let remaining = deadline.saturating_sub(elapsed);
            match self.rx.recv_timeout(remaining) {
                Ok(line) => {
                    if line.starts_with("info") {
                        snapshot.update_from_line(&line);
                        continue;
                    }
                    if let Some(rest) = line.strip_prefix("bestmove ") {
                        let bestmove = rest
                            .split_whitespace()
                            .next()
                            .unwrap_or_default()
                            .to_string();
                        debug!("{}: bestmove {bestmove} depth {:?}", self.label, snapshot.depth);
                        let score = snapshot.score.ok_or_else(|| {
                            EngineError::Protocol(
                                "bestmove without a score in any info line".to_string(),
                            )
                        })?;
                        return Ok(Analysis {
                            pv: snapshot.pv,
                            score: PovScore::new(score, pos.turn()),
                            depth: snapshot.depth,
                            bestmove,
                            elapsed_ms: start.elapsed().as_millis() as u64,
                        });
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !stop_sent {
                        self.write_line("stop")?;
                        stop_sent = true;
                    } else {
                        return Err(EngineError::Timeout {
                            elapsed_ms: start.elapsed().as_millis() as u64,
                        });
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("{}: engine exited during search", self.label);
                    return Err(EngineError::Exited);
                }
            }
        }
    }

    pub fn sync_ready(&mut self) -> Result<(), EngineError> {
        self.write_line("isready")?;
        loop {
            let line = self.recv_line(ENGINE_READY_TIMEOUT)?;
            if line == "readyok" {
                break;
            }
        }
        Ok(())
    }

    fn recv_line(&self, timeout: Duration) -> Result<String, EngineError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => EngineError::Timeout {
                elapsed_ms: timeout.as_millis() as u64,
            },
            RecvTimeoutError::Disconnected => EngineError::Exited,
        })
    }

    fn set_option_if_available(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        if self.opt_names.is_empty() || self.opt_names.contains(name) {
            self.write_line(&format!("setoption name {name} value {value}"))?;
        }
        Ok(())
    }

    fn write_line(&mut self, msg: &str) -> Result<(), EngineError> {
        self.stdin.write_all(msg.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()?;
        Ok(())
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        let _ = self.write_line("quit");
        let deadline = Instant::now() + ENGINE_QUIT_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            std::thread::sleep(ENGINE_QUIT_POLL_INTERVAL);
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// info 行から multipv=1 の最新情報を保持する
#[derive(Default, Clone)]
struct InfoSnapshot {
    score: Option<Score>,
    depth: Option<u32>,
    pv: Vec<String>,
}

impl InfoSnapshot {
    fn update_from_line(&mut self, line: &str) {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.first().copied() != Some("info") {
            return;
        }
        // multipv 指定があり 1 でなければ無視する
        let mut idx = 1;
        while idx + 1 < tokens.len() {
            if tokens[idx] == "multipv" {
                if tokens[idx + 1].parse::<u32>().unwrap_or(1) != 1 {
                    return;
                }
                break;
            }
            idx += 1;
        }
        let mut i = 1;
        while i < tokens.len() {
            match tokens[i] {
                "depth" => {
                    if i + 1 < tokens.len() {
                        self.depth = tokens[i + 1].parse::<u32>().ok();
                        i += 1;
                    }
                }
                "score" => {
                    if i + 2 < tokens.len() {
                        match tokens[i + 1] {
                            "cp" => {
                                self.score = tokens[i + 2].parse::<i32>().ok().map(Score::Cp);
                                i += 2;
                            }
                            "mate" => {
                                self.score = tokens[i + 2].parse::<i32>().ok().map(Score::Mate);
                                i += 2;
                            }
                            _ => {}
                        }
                    }
                }
                "pv" => {
                    let pv: Vec<String> =
                        tokens[i + 1..].iter().map(|s| s.to_string()).collect();
                    if !pv.is_empty() {
                        self.pv = pv;
                    }
                    break;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

fn parse_option_name(line: &str) -> Option<String> {
    let mut tokens = line.split_whitespace().peekable();
    while let Some(tok) = tokens.next() {
        if tok == "name" {
            let mut parts = Vec::new();
            while let Some(next) = tokens.peek() {
                if *next == "type" {
                    break;
                }
                parts.push(tokens.next()?.to_string());
            }
            if !parts.is_empty() {
                return Some(parts.join(" "));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_line_parsing() {
        let mut snap = InfoSnapshot::default();
        snap.update_from_line(
            "info depth 3 seldepth 3 multipv 1 score cp 648 nodes 133 nps 66500 pv d4f5 e4f5 e7g5",
        );
        assert_eq!(snap.depth, Some(3));
        assert_eq!(snap.score, Some(Score::Cp(648)));
        assert_eq!(snap.pv, vec!["d4f5", "e4f5", "e7g5"]);
    }

    #[test]
    fn test_info_line_mate_overrides_cp() {
        let mut snap = InfoSnapshot::default();
        snap.update_from_line("info depth 5 score cp 300 pv e2e4");
        snap.update_from_line("info depth 7 score mate 2 pv e2e4 e7e5");
        assert_eq!(snap.score, Some(Score::Mate(2)));
        assert_eq!(snap.depth, Some(7));
    }

    #[test]
    fn test_info_line_ignores_secondary_multipv() {
        let mut snap = InfoSnapshot::default();
        snap.update_from_line("info depth 5 multipv 2 score cp -50 pv a2a3");
        assert_eq!(snap.score, None);
        assert!(snap.pv.is_empty());
    }

    #[test]
    fn test_pov_score_white_flip() {
        // 黒視点の +648 は白視点では -648
        let s = PovScore::new(Score::Cp(648), Color::Black);
        assert_eq!(s.white(DEFAULT_MATE_SCORE), -648);
        assert_eq!(s.for_side(Color::Black, DEFAULT_MATE_SCORE), 648);
    }

    #[test]
    fn test_mate_score_substitute() {
        assert_eq!(Score::Mate(2).value(318), 316);
        assert_eq!(Score::Mate(-3).value(318), -315);
        assert_eq!(Score::Cp(-42).value(318), -42);
    }

    #[test]
    fn test_spawn_missing_binary_is_unavailable() {
        // バイナリ欠落は構築時点で Unavailable として見える
        let cfg = EngineConfig::new("/nonexistent/path/to/engine");
        let err = EngineProcess::spawn(&cfg, "test".to_string()).unwrap_err();
        match err {
            EngineError::Unavailable { reason } => {
                assert!(reason.contains("/nonexistent/path/to/engine"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_option_name() {
        assert_eq!(
            parse_option_name("name Skill Level type spin default 20 min 0 max 20"),
            Some("Skill Level".to_string())
        );
        assert_eq!(parse_option_name("type check default false"), None);
    }
}
