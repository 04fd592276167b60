//! NNUE 重みフォーマットのコーデック
//!
//! nnue-pytorch が出力する .nnue ファイルの読み書きを提供する。
//! ファイルレイアウト（全てリトルエンディアン）:
//!
//! ```text
//! [u32 version][u32 network_hash][u32 desc_len][desc_len bytes description]
//! [u32 ft_hash][i16 bias[L1]][i16 weight[input_dim][L1]]
//! [u32 fc_hash][FC層ブロック...]
//! ```
//!
//! 各FC層ブロック: `[i32 bias[out]][i8 weight[out][pad32(in)]]`

pub mod checkpoint;
pub mod codec;
pub mod constants;
pub mod error;
pub mod feature_set;
pub mod hash;
pub mod network;
pub mod reader;
pub mod spec;
pub mod weights;
pub mod writer;

pub use codec::{Dtype, QuantStats};
pub use error::NnueError;
pub use feature_set::FeatureSetDescriptor;
pub use network::Network;
pub use reader::{read_nnue, read_nnue_strict};
pub use spec::ArchitectureSpec;
pub use weights::{Linear, WeightSet};
pub use writer::{write_nnue, write_nnue_strict, write_nnue_with_tolerance};
