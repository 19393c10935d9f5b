//! Ports - 抽象化レイヤー
//!
//! Engine の外側（workflow service）とのインターフェース。
//! Core は純粋な decider なので、外へ出ていくのは decision の返送だけです。

pub mod decision_sink;

// 主要な trait を再エクスポート
pub use self::decision_sink::{DecisionSink, SinkError};
