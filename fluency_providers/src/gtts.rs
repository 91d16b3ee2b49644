//! Google Translate text-to-speech.
//!
//! The endpoint accepts at most 100 characters per request, so replies are
//! split on punctuation (then whitespace) into chunks and the returned MP3
//! segments are concatenated. MP3 frames are self-delimiting, so the joined
//! bytes play back as one stream.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use fluency_core::{AudioFormat, TextToSpeech, VoiceSelection};
use regex::Regex;
use reqwest::{Client, Url};
use tracing::{debug, info};

/// Longest text the endpoint accepts in one request.
pub const MAX_CHUNK_CHARS: usize = 100;

static SENTENCE_PIECE: OnceLock<Regex> = OnceLock::new();

/// A clause of text followed by its closing punctuation, if any.
#[expect(
    clippy::expect_used,
    reason = "Static regex pattern validated at compile time"
)]
fn sentence_piece() -> &'static Regex {
    SENTENCE_PIECE.get_or_init(|| {
        Regex::new(r"[^.!?;:,\n]+[.!?;:,\n]*")
            .expect("Static regex pattern is guaranteed to be valid")
    })
}

pub struct GoogleTts {
    client: Client,
    tld: String,
}

impl GoogleTts {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        info!("Creating GoogleTts");
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            tld: "com".to_string(),
        })
    }

    /// Top-level domain of the translate host, e.g. `co.uk` for a British accent.
    #[must_use]
    pub fn with_tld(mut self, tld: String) -> Self {
        self.tld = tld;
        self
    }

    fn chunk_url(
        &self,
        chunk: &str,
        idx: usize,
        total: usize,
        voice: &VoiceSelection,
    ) -> anyhow::Result<Url> {
        let speed = if voice.slow { "0.3" } else { "1" };
        let idx = idx.to_string();
        let total = total.to_string();
        let textlen = chunk.chars().count().to_string();
        let url = Url::parse_with_params(
            &format!("https://translate.google.{}/translate_tts", self.tld),
            &[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", voice.language.as_str()),
                ("ttsspeed", speed),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("client", "tw-ob"),
                ("textlen", textlen.as_str()),
            ],
        )?;
        Ok(url)
    }
}

#[async_trait]
impl TextToSpeech for GoogleTts {
    async fn synthesize(&self, text: &str, voice: &VoiceSelection) -> anyhow::Result<Vec<u8>> {
        let chunks = split_for_speech(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            anyhow::bail!("Nothing to speak");
        }

        info!(
            "Synthesizing {} chunk(s) with Google TTS: lang={}, slow={}",
            chunks.len(),
            voice.language,
            voice.slow
        );

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            let url = self.chunk_url(chunk, idx, chunks.len(), voice)?;
            let bytes = self
                .client
                .get(url)
                .header(reqwest::header::REFERER, "http://translate.google.com/")
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            debug!("Chunk {idx}: {} bytes", bytes.len());
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }

    fn output_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }
}

/// Split `text` into speakable chunks of at most `max_chars` characters.
///
/// Sentence and clause punctuation is preferred as a boundary; pieces that
/// are still too long are split on whitespace, and single words longer than
/// the limit are cut by character.
#[must_use]
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for piece in sentence_piece().find_iter(text) {
        for word in piece.as_str().split_whitespace() {
            for part in split_long_word(word, max_chars) {
                let needed = if current.is_empty() {
                    part.chars().count()
                } else {
                    current.chars().count() + 1 + part.chars().count()
                };
                if needed > max_chars && !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(&part);
            }
        }
        // Close the chunk at a sentence boundary once it is reasonably full.
        if current.chars().count() * 2 >= max_chars {
            chunks.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_long_word(word: &str, max_chars: usize) -> Vec<String> {
    if word.chars().count() <= max_chars {
        return vec![word.to_string()];
    }
    word.chars()
        .collect::<Vec<_>>()
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}
