//! fabkit-core
//!
//! Concurrent chaincode invocation engine for the `fabkit` CLI.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, errors, validation codes, specs, state, decision, summary）
//! - **ports**: 抽象化レイヤー（ChannelClient, Printer, RandomSource, IdGenerator）
//! - **app**: アプリケーションロジック（coordinator, pool, task, retry, filter, expander, progress）
//! - **impls**: 実装（SimulatedChannel, WriterPrinter, RandomSource）
//! - **config**: `InvokeConfig` と target peer の解決
//! - **error**: 設定・pool・coordinator のエラー型

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use app::InvocationCoordinator;
pub use config::InvokeConfig;
pub use error::{ConfigError, CoordinatorError, PoolError};
