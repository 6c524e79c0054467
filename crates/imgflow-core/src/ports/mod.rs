//! Ports - 外部システムへのインターフェース
//!
//! The object store, the metadata table, the mail transport and the
//! classifier are collaborators the pipeline consumes, not subsystems it
//! owns. Each gets a trait here and an in-memory implementation in `impls`;
//! components receive them as `Arc<dyn ...>` at construction time.

pub mod classifier;
pub mod clock;
pub mod id_generator;
pub mod mailer;
pub mod metadata_store;
pub mod object_store;

pub use self::classifier::{Classifier, Verdict};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::mailer::{MailError, Mailer, OutboundMail};
pub use self::metadata_store::{MetadataStore, StoreError};
pub use self::object_store::{ObjectStore, ObjectStoreError};
