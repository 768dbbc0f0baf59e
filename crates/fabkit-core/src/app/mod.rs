//! App - アプリケーション層
//!
//! Ports を組み合わせて invocation engine を実装します。
//!
//! # 主要コンポーネント
//! - **InvocationCoordinator**: run 全体の組み立てと集計
//! - **WorkerPool**: 同時実行数 C の worker pool（同期 hand-off）
//! - **InvokeTask**: 1 回の chaincode 呼び出し（retry 込み）
//! - **RetryHandle**: retry ループと pre-retry hook
//! - **ResponseConsistencyFilter**: endorsement の一貫性チェック
//! - **ArgExpander**: `$rand` / `$pad` の展開
//! - **ProgressCollector**: 完了通知の集計と進捗表示

pub mod coordinator;
pub mod expander;
pub mod filter;
pub mod pool;
pub mod progress;
pub mod retry;
pub mod task;

// 主要な型を再エクスポート
pub use self::coordinator::InvocationCoordinator;
pub use self::expander::ArgExpander;
pub use self::filter::ResponseConsistencyFilter;
pub use self::pool::{Job, WorkerPool};
pub use self::progress::{Completion, ProgressCollector, Tally};
pub use self::retry::RetryHandle;
pub use self::task::{CompletionCallback, InvokeTask};
