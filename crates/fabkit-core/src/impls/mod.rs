//! Impls - 実装（開発用・CLI 用）
//!
//! # 含まれる実装
//! - **SimulatedChannel**: in-memory ledger を持つ開発用の `ChannelClient`
//! - **WriterPrinter**: stdout / stderr / log に出力する `Printer`
//! - **ThreadRandom / SeededRandom**: `RandomSource`
//!
//! # 本番用実装
//! 実際の platform SDK を使う `ChannelClient` は別クレートに配置します。

pub mod printer;
pub mod random;
pub mod simulated;

// 主要な型を再エクスポート
pub use self::printer::{OutputTarget, PrintFormat, SharedBuffer, WriterPrinter};
pub use self::random::{SeededRandom, ThreadRandom};
pub use self::simulated::SimulatedChannel;
