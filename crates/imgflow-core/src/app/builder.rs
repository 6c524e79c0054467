//! PipelineBuilder - パイプラインの構築とワイヤリング
//!
//! # Fail-fast 設計
//! - 外部コラボレータ（MetadataStore, Mailer）は必須
//! - build() 時に不足があれば BuildError を返す
//! - Classifier / Clock / RejectionPolicy は省略可能（デフォルトあり）

use std::sync::Arc;

use super::pipeline::Pipeline;
use super::processor::RejectionPolicy;
use crate::config::PipelineConfig;
use crate::impls::ExtensionClassifier;
use crate::ports::{Classifier, Clock, Mailer, MetadataStore, SystemClock};

/// BuildError はパイプライン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no metadata store configured")]
    MissingMetadataStore,

    #[error("no mailer configured")]
    MissingMailer,
}

/// # 使用例
/// ```ignore
/// let pipeline = PipelineBuilder::new(config)
///     .metadata_store(Arc::new(InMemoryMetadataStore::new()))
///     .mailer(Arc::new(LogMailer))
///     .build()?;
/// ```
pub struct PipelineBuilder {
    config: PipelineConfig,
    store: Option<Arc<dyn MetadataStore>>,
    mailer: Option<Arc<dyn Mailer>>,
    classifier: Option<Arc<dyn Classifier>>,
    clock: Option<Arc<dyn Clock>>,
    rejection_policy: RejectionPolicy,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            store: None,
            mailer: None,
            classifier: None,
            clock: None,
            rejection_policy: RejectionPolicy::default(),
        }
    }

    pub fn metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Defaults to [`ExtensionClassifier::default`] (`.jpg`, `.png`).
    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    pub fn build(self) -> Result<Pipeline, BuildError> {
        let store = self.store.ok_or(BuildError::MissingMetadataStore)?;
        let mailer = self.mailer.ok_or(BuildError::MissingMailer)?;
        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(ExtensionClassifier::default()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        Ok(Pipeline::wire(
            self.config,
            store,
            mailer,
            classifier,
            clock,
            self.rejection_policy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailSettings;
    use crate::impls::{InMemoryMetadataStore, LogMailer};

    fn config() -> PipelineConfig {
        PipelineConfig::with_mail(MailSettings::new(
            "eu-west-1",
            "noreply@example.com",
            "owner@example.com",
        ))
        .unwrap()
    }

    #[test]
    fn build_success() {
        let pipeline = PipelineBuilder::new(config())
            .metadata_store(Arc::new(InMemoryMetadataStore::new()))
            .mailer(Arc::new(LogMailer))
            .build();
        assert!(pipeline.is_ok());
    }

    #[test]
    fn build_missing_store() {
        let pipeline = PipelineBuilder::new(config())
            .mailer(Arc::new(LogMailer))
            .build();
        assert!(matches!(pipeline, Err(BuildError::MissingMetadataStore)));
    }

    #[test]
    fn build_missing_mailer() {
        let pipeline = PipelineBuilder::new(config())
            .metadata_store(Arc::new(InMemoryMetadataStore::new()))
            .build();
        assert!(matches!(pipeline, Err(BuildError::MissingMailer)));
    }
}
