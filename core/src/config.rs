use std::time::Duration;

/// Fixed texts the widget shows when no stage produced an answer.
#[derive(Debug, Clone)]
pub struct Messages {
    /// Provisional bubble posted before streaming starts.
    pub placeholder: String,
    /// Shown while a long generation is still streaming.
    pub generating: String,
    pub no_answer: String,
    /// Emitted when the generative primitive is missing altogether.
    pub unavailable: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            placeholder: "…".to_string(),
            generating: "생성 중…".to_string(),
            no_answer: "응답을 생성하지 못했습니다.".to_string(),
            unavailable: "로컬 AI 사용이 불가합니다. 데스크톱 Chrome 138+와 저장공간(≥22GB)을 확인한 뒤 다시 시도해주세요."
                .to_string(),
        }
    }
}

/// Tunables for retrieval, routing and reply shaping.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum gap before an FAQ may be served again by the intent matcher.
    pub faq_cooldown: Duration,
    /// Queries of at most this many characters use `short_query_cutoff`.
    pub short_query_chars: usize,
    pub short_query_cutoff: f32,
    pub match_cutoff: f32,
    pub prefilter_limit: usize,
    pub prefilter_min_jaccard: f32,
    pub search_top_k: usize,
    pub snippet_chars: usize,
    pub bm25_k1: f32,
    pub bm25_b: f32,
    pub max_sentences: usize,
    pub max_chars: usize,
    /// Length hint written into generation prompts; the hard clamp is `max_chars`.
    pub prompt_char_hint: usize,
    /// Detector confidence needed to override a script hint.
    pub hinted_confidence: f32,
    /// Detector confidence needed when no script hint exists.
    pub unhinted_confidence: f32,
    pub hangul_ratio: f32,
    /// Streaming progress is pushed to the sink every this many characters.
    pub progress_every_chars: usize,
    pub messages: Messages,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            faq_cooldown: Duration::from_secs(30),
            short_query_chars: 5,
            short_query_cutoff: 0.55,
            match_cutoff: 0.75,
            prefilter_limit: 5,
            prefilter_min_jaccard: 0.15,
            search_top_k: 5,
            snippet_chars: 240,
            bm25_k1: 1.5,
            bm25_b: 0.75,
            max_sentences: 4,
            max_chars: 360,
            prompt_char_hint: 350,
            hinted_confidence: 0.85,
            unhinted_confidence: 0.75,
            hangul_ratio: 0.15,
            progress_every_chars: 40,
            messages: Messages::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_faq_cooldown(mut self, cooldown: Duration) -> Self {
        self.faq_cooldown = cooldown;
        self
    }

    pub fn with_bm25(mut self, k1: f32, b: f32) -> Self {
        self.bm25_k1 = k1;
        self.bm25_b = b;
        self
    }

    pub fn with_messages(mut self, messages: Messages) -> Self {
        self.messages = messages;
        self
    }

    /// Matcher score a query of `chars` characters must reach.
    pub fn cutoff_for(&self, chars: usize) -> f32 {
        if chars <= self.short_query_chars {
            self.short_query_cutoff
        } else {
            self.match_cutoff
        }
    }
}
