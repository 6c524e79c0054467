//! imgflow-core
//!
//! Event-driven image ingestion: object-store change notifications fan out
//! over a filtered pub/sub bus into direct handlers and a durable queue, a
//! classifier gates uploads, and rejected or exhausted messages escalate to a
//! dead-letter queue whose consumer mails the owner.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, event, envelope, image, object key / JSON の境界デコード）
//! - **ports**: 外部システムの抽象（ObjectStore, MetadataStore, Mailer, Classifier, Clock, IdGenerator）
//! - **impls**: ports のインメモリ実装
//! - **bus**: フィルタ付き pub/sub
//! - **queue**: at-least-once の durable queue + dead-letter escalation
//! - **worker**: queue consumer と worker group
//! - **app**: ハンドラ、Notifier、PipelineBuilder / Pipeline
//! - **config**: 起動時に検証される設定

pub mod app;
pub mod bus;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod worker;

pub use app::{Pipeline, PipelineBuilder, RejectionPolicy};
pub use config::{ConfigError, PipelineConfig};
pub use error::{ErrorKind, HandlerError};
