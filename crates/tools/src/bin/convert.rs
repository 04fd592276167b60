//! NNUE 重みファイルの変換ツール
//!
//! 使い方:
//!   # 量子化 .nnue → f32 チェックポイント
//!   convert nn-82215d0fd0df.nnue nn.ckpt
//!
//!   # f32 チェックポイント → 量子化 .nnue
//!   convert nn.ckpt nn-quantized.nnue
//!
//! 変換方向は拡張子で決まる。失敗時は失敗種別と位置を表示して
//! 非ゼロ終了し、壊れた出力ファイルは残さない（一時ファイルへ
//! 書いてから原子的に置換する）。

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::info;
use tempfile::NamedTempFile;

use chessmate_core::nnue::checkpoint::{load_checkpoint, save_checkpoint};
use chessmate_core::nnue::{
    ArchitectureSpec, WeightSet, feature_set, read_nnue, read_nnue_strict, write_nnue,
    write_nnue_strict,
};

#[derive(Parser)]
#[command(about = "NNUE 重みファイルの変換 (.nnue ↔ .ckpt)")]
struct Cli {
    /// 入力ファイル（.nnue または .ckpt）
    source: PathBuf,

    /// 出力ファイル（入力と逆の形式）
    target: PathBuf,

    /// 特徴量セット名
    #[arg(long, default_value = "halfkp")]
    features: String,

    /// 厳格モード: 末尾の余剰バイトや量子化オーバーフローもエラーにする
    #[arg(long)]
    strict: bool,
}

enum Direction {
    /// .nnue → .ckpt
    Dequantize,
    /// .ckpt → .nnue
    Quantize,
}

fn direction(source: &Path, target: &Path) -> Result<Direction> {
    let ext = |p: &Path| {
        p.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    };
    match (ext(source).as_deref(), ext(target).as_deref()) {
        (Some("nnue"), Some("ckpt")) => Ok(Direction::Dequantize),
        (Some("ckpt"), Some("nnue")) => Ok(Direction::Quantize),
        _ => bail!(
            "unsupported conversion {} -> {} (expected .nnue <-> .ckpt)",
            source.display(),
            target.display()
        ),
    }
}

/// 一時ファイルを置くディレクトリ
///
/// 必ず出力先と同じディレクトリを返す。システムの一時ディレクトリは
/// 別ファイルシステムのことがあり、置換の rename が EXDEV で失敗する。
fn staging_dir(target: &Path) -> &Path {
    match target.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// 出力を一時ファイルへ書いてから原子的に置換する
fn write_atomically(
    target: &Path,
    write: impl FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(staging_dir(target))
        .context("failed to create temporary file")?;

    {
        let mut writer = BufWriter::new(&mut tmp);
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(target)
        .with_context(|| format!("failed to replace {}", target.display()))?;
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let feature_set = *feature_set::by_name(&cli.features)?;
    let spec = ArchitectureSpec::standard(feature_set);
    info!("architecture: {spec}");

    let file = File::open(&cli.source)
        .with_context(|| format!("failed to open {}", cli.source.display()))?;
    let mut reader = BufReader::new(file);

    match direction(&cli.source, &cli.target)? {
        Direction::Dequantize => {
            let weights = if cli.strict {
                read_nnue_strict(&mut reader, &spec)
            } else {
                read_nnue(&mut reader, &spec)
            }
            .with_context(|| format!("failed to decode {}", cli.source.display()))?;
            info!("decoded: {:?}", weights.description);

            write_atomically(&cli.target, |w| {
                save_checkpoint(w, &spec, &weights)?;
                Ok(())
            })?;
        }
        Direction::Quantize => {
            let weights: WeightSet = load_checkpoint(&mut reader, &spec)
                .with_context(|| format!("failed to load {}", cli.source.display()))?;

            write_atomically(&cli.target, |w| {
                if cli.strict {
                    write_nnue_strict(w, &spec, &weights)?;
                } else {
                    let stats = write_nnue(w, &spec, &weights)?;
                    if stats.clamped > 0 {
                        info!("quantization clamped {} values", stats.clamped);
                    }
                }
                Ok(())
            })?;
        }
    }

    info!("wrote {}", cli.target.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    run(&cli)
}
