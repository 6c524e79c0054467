//! App - アプリケーション層
//!
//! ports を組み合わせてパイプラインを組み立てます。
//!
//! # 主要コンポーネント
//! - **PipelineBuilder**: 構築とワイヤリング（fail-fast）
//! - **Pipeline**: bus / queues / consumers の所有者
//! - **handlers**: bus に直接ぶら下がるハンドラ（確認メール、更新、削除）
//! - **processor**: image queue の分類ゲートと DLQ の却下メール
//! - **Notifier**: メールの組み立てと送信

pub mod builder;
pub mod handlers;
pub mod notifier;
pub mod pipeline;
pub mod processor;

pub use self::builder::{BuildError, PipelineBuilder};
pub use self::handlers::{ConfirmationMailer, DeleteImageHandler, UpdateDescriptionHandler};
pub use self::notifier::{Notifier, RecipientRole};
pub use self::pipeline::{DrainReport, IngestReport, Pipeline, PipelineHandle, PipelineStatus};
pub use self::processor::{ImageProcessor, RejectionMailer, RejectionPolicy};
