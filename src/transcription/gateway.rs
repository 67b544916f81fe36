//! Ordered engine fallback with per-engine timeouts and confidence floors

use super::{EngineOutput, TranscriptionEngine};
use crate::config::TranscriptionConfig;
use crate::types::{AudioChunk, ChunkPayload, TranscriptSegment};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

struct EngineSlot {
    engine: Arc<dyn TranscriptionEngine>,
    timeout: Duration,
    min_confidence: Option<f64>,
}

/// Turns chunk payloads into transcript segments.
///
/// Text payloads pass straight through. Audio is offered to each engine in
/// order; the first result that clears its engine's confidence floor wins.
/// Failing every engine is not an error: the segment is marked degraded
/// instead.
pub struct TranscriptionGateway {
    engines: Vec<EngineSlot>,
    min_confidence: f64,
}

impl TranscriptionGateway {
    /// Gateway with no engines and the given default confidence floor
    pub fn new(min_confidence: f64) -> Self {
        Self {
            engines: Vec::new(),
            min_confidence,
        }
    }

    pub fn from_config(config: &TranscriptionConfig) -> Self {
        Self::new(config.min_confidence)
    }

    /// Append an engine to the fallback chain
    pub fn with_engine(
        mut self,
        engine: Arc<dyn TranscriptionEngine>,
        timeout: Duration,
        min_confidence: Option<f64>,
    ) -> Self {
        self.engines.push(EngineSlot {
            engine,
            timeout,
            min_confidence,
        });
        self
    }

    pub fn engine_count(&self) -> usize {
        self.engines.len()
    }

    pub fn engine_names(&self) -> Vec<String> {
        self.engines
            .iter()
            .map(|slot| slot.engine.name().to_string())
            .collect()
    }

    /// Transcribe one chunk. Never fails.
    pub async fn transcribe(&self, sequence_number: u64, payload: ChunkPayload) -> TranscriptSegment {
        match payload {
            ChunkPayload::Text { text } => {
                TranscriptSegment::accepted(sequence_number, text, 1.0, "text")
            }
            ChunkPayload::Audio(audio) => self.transcribe_audio(sequence_number, &audio).await,
        }
    }

    async fn transcribe_audio(&self, sequence_number: u64, audio: &AudioChunk) -> TranscriptSegment {
        if audio.is_empty() {
            debug!(sequence_number, "Empty audio chunk");
            return TranscriptSegment::unavailable(sequence_number);
        }

        // Best result that fell below its floor, kept for degraded output
        let mut best_below_floor: Option<(EngineOutput, String)> = None;

        for slot in &self.engines {
            let name = slot.engine.name();
            let floor = slot.min_confidence.unwrap_or(self.min_confidence);

            let output = match timeout(slot.timeout, slot.engine.transcribe(audio)).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    warn!(engine = %name, sequence_number, error = %e, "Transcription engine failed");
                    continue;
                }
                Err(_) => {
                    warn!(
                        engine = %name,
                        sequence_number,
                        timeout_ms = slot.timeout.as_millis() as u64,
                        "Transcription engine timed out"
                    );
                    continue;
                }
            };

            if output.text.trim().is_empty() {
                debug!(engine = %name, sequence_number, "Engine returned no text");
                continue;
            }

            if output.confidence >= floor {
                debug!(
                    engine = %name,
                    sequence_number,
                    confidence = output.confidence,
                    "Transcription accepted"
                );
                return TranscriptSegment::accepted(
                    sequence_number,
                    output.text,
                    output.confidence,
                    name,
                );
            }

            debug!(
                engine = %name,
                sequence_number,
                confidence = output.confidence,
                floor,
                "Transcription below confidence floor"
            );
            let better = best_below_floor
                .as_ref()
                .map_or(true, |(best, _)| output.confidence > best.confidence);
            if better {
                best_below_floor = Some((output, name.to_string()));
            }
        }

        match best_below_floor {
            Some((output, engine)) => {
                warn!(
                    engine = %engine,
                    sequence_number,
                    confidence = output.confidence,
                    "Using low-confidence transcription"
                );
                TranscriptSegment::low_confidence(
                    sequence_number,
                    output.text,
                    output.confidence,
                    engine,
                )
            }
            None => {
                warn!(
                    sequence_number,
                    engines = self.engines.len(),
                    "No transcription available for chunk"
                );
                TranscriptSegment::unavailable(sequence_number)
            }
        }
    }
}
