//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryMetadataStore**: `Images` テーブルの代わり
//! - **InMemoryMailer** / **LogMailer**: メール送信の代わり
//! - **ExtensionClassifier**: 拡張子ベースの分類器
//! - **InMemoryObjectStore**: バケットの代わり（変更通知を bus に流す）
//!
//! Cloud-backed implementations live outside this crate.

pub mod extension_classifier;
pub mod inmem_mailer;
pub mod inmem_metadata;
pub mod inmem_object_store;

pub use self::extension_classifier::ExtensionClassifier;
pub use self::inmem_mailer::{InMemoryMailer, LogMailer};
pub use self::inmem_metadata::InMemoryMetadataStore;
pub use self::inmem_object_store::InMemoryObjectStore;
