//! Whole-configuration snapshots for moving a widget setup between
//! installs.

use crate::faq::{migrate_faqs, FaqItem};
use crate::index::Article;
use crate::persist::Store;
use crate::persona::Persona;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const PRESET_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub agent_profile: serde_json::Value,
    #[serde(default)]
    pub faq_list: Vec<FaqItem>,
    #[serde(default)]
    pub doc_articles: Vec<Article>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<Persona>,
}

impl Preset {
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text).context("invalid preset JSON")?;
        anyhow::ensure!(value.is_object(), "preset format not recognized");
        serde_json::from_value(value).context("preset format not recognized")
    }
}

/// Snapshot of everything an operator authored.
pub fn export_preset(store: &Store) -> Result<Preset> {
    Ok(Preset {
        version: PRESET_VERSION,
        agent_profile: store.load_profile()?,
        faq_list: store.load_faqs()?,
        doc_articles: store.load_articles()?,
        persona: store.load_persona()?,
    })
}

/// Overwrite profile, FAQs and articles (and the persona when present), and
/// drop the compiled index. The caller triggers the rebuild.
pub fn import_preset(store: &Store, mut preset: Preset) -> Result<Preset> {
    migrate_faqs(&mut preset.faq_list);
    let profile = if preset.agent_profile.is_null() { serde_json::json!({}) } else { preset.agent_profile.clone() };
    store.save_profile(&profile)?;
    if let Some(persona) = &preset.persona {
        store.save_persona(persona)?;
    }
    store.save_faqs(&preset.faq_list)?;
    store.save_articles(&preset.doc_articles)?;
    store.clear_compiled()?;
    store.flush()?;
    tracing::info!(faqs = preset.faq_list.len(), articles = preset.doc_articles.len(), "preset imported");
    Ok(preset)
}
