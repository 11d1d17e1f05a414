//! Local-first retrieval and reply assembly for a multilingual support widget.
//!
//! Incoming text is identified ([`lang`]), matched against fast intent rules
//! ([`fast_intent`]), routed through the FAQ shortlist ([`faq`]), grounded on
//! BM25 document hits ([`search`]) and finally handed to free generation. The
//! [`pipeline`] module wires these stages together; [`persona`] owns the
//! style rules every reply passes through.

pub mod capability;
pub mod config;
pub mod error;
pub mod fast_intent;
pub mod faq;
pub mod index;
pub mod lang;
pub mod persist;
pub mod persona;
pub mod pipeline;
pub mod preset;
pub mod reindex;
pub mod sanitize;
pub mod search;
pub mod session;
pub mod testing;
pub mod tokenizer;

pub use capability::{Capabilities, ChunkStream, Detection, Generator, LanguageDetector, Translator, TranslatorFactory};
pub use config::PipelineConfig;
pub use error::CapabilityError;
pub use faq::FaqItem;
pub use index::{Article, DocId, DocRow, InvertedIndex, Posting, TermRow};
pub use persist::{IndexMeta, Store};
pub use persona::Persona;
pub use pipeline::{Assistant, Reply, ReplySink, ReplyStage, Transcript};
pub use preset::Preset;
pub use reindex::IndexHandle;
pub use search::SearchHit;
pub use session::Session;
