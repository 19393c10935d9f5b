//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **RecordingSink**: 応答をメモリに記録する DecisionSink
//!
//! # 本番用実装
//! workflow service へ実際に応答する sink は利用側のクレートに置きます。

pub mod recording_sink;

// 主要な型を再エクスポート
pub use self::recording_sink::RecordingSink;
