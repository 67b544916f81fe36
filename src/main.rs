//! Voice Scam Shield - Main Entry Point
//!
//! Accepts live call chunks over NATS, keeps one worker per call session,
//! and publishes classification events, risk alerts and call reports.
//! Inbound messages are handled in parallel, bounded by a semaphore.

use anyhow::Result;
use async_nats::{Message, Subject};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use voice_scam_shield::{
    config::{AppConfig, LoggingConfig, TranscriptionConfig},
    consumer::CallConsumer,
    metrics::{MetricsReporter, PipelineMetrics},
    models::FraudClassifier,
    producer::{EventProducer, NatsReportSink},
    report::{CallReport, ReportSink},
    session::SessionPipeline,
    transcription::{NatsEngine, TranscriptionGateway},
    types::{
        AnalyzeRequest, ChunkMessage, ControlRequest, ControlResponse, SubmitOutcome,
    },
};

/// Which subscription a message came from
#[derive(Debug, Clone, Copy)]
enum Inbound {
    Control,
    Chunk,
    Analyze,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Optional config path as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    init_logging(&config.logging)?;
    info!("Starting Voice Scam Shield");
    info!(
        "Thresholds: suspicious>={:.2}, scam>={:.2}, k={:.1}",
        config.scoring.suspicious_threshold,
        config.scoring.scam_threshold,
        config.scoring.normalization_k
    );

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Pattern catalog, analyzer and optional auxiliary model
    let classifier = Arc::new(FraudClassifier::from_config(&config)?);
    info!(
        catalog_version = %classifier.catalog().version(),
        patterns = classifier.catalog().len(),
        model = classifier.has_model(),
        "Fraud classifier initialized"
    );

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!("Connected to NATS at {}", config.nats.url);

    let gateway = build_gateway(&client, &config.transcription);
    info!(
        "Transcription gateway initialized with {} engines: {:?}",
        gateway.engine_count(),
        gateway.engine_names()
    );

    let producer = EventProducer::new(client.clone(), &config.nats.event_subject_prefix);
    let report_sink = Arc::new(NatsReportSink::new(client.clone(), &config.nats.report_subject));

    let (pipeline, mut events) = SessionPipeline::new(
        classifier,
        Arc::new(gateway),
        config.session.clone(),
        metrics.clone(),
    );
    let pipeline = Arc::new(pipeline.with_report_sink(report_sink.clone()));

    // Forward pipeline events to NATS
    let forwarder = {
        let producer = producer.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Err(e) = producer.publish(&event).await {
                    error!(
                        session_id = %event.session_id(),
                        error = %e,
                        "Failed to publish pipeline event"
                    );
                }
            }
        })
    };

    // Start metrics reporter
    let reporter = MetricsReporter::new(metrics.clone(), config.pipeline.metrics_interval_secs);
    tokio::spawn(reporter.start());

    let consumer = CallConsumer::new(client.clone(), &config.nats);
    let mut subscriptions = consumer.subscribe().await?;

    let num_workers = config.pipeline.workers;
    info!(
        "Listening on {}, {} and {} with {} parallel workers",
        consumer.control_subject(),
        consumer.chunk_subject(),
        consumer.analyze_subject(),
        num_workers
    );
    info!("Publishing events to: {}.<session_id>", producer.subject_prefix());

    // Semaphore to limit concurrent processing
    let semaphore = Arc::new(Semaphore::new(num_workers));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        let (kind, message) = tokio::select! {
            Some(message) = subscriptions.control.next() => (Inbound::Control, message),
            Some(message) = subscriptions.chunks.next() => (Inbound::Chunk, message),
            Some(message) = subscriptions.analyze.next() => (Inbound::Analyze, message),
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            else => break,
        };

        // Acquire permit (limits concurrent tasks)
        let permit = semaphore.clone().acquire_owned().await?;

        let pipeline = pipeline.clone();
        let producer = producer.clone();
        let report_sink = report_sink.clone();

        tokio::spawn(async move {
            handle_message(kind, message, &pipeline, &producer, report_sink.as_ref()).await;
            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    pipeline.shutdown().await;
    drop(pipeline);

    // Let the last session summaries go out
    if tokio::time::timeout(Duration::from_secs(2), forwarder).await.is_err() {
        warn!("Event forwarder did not drain in time");
    }
    if let Err(e) = client.flush().await {
        warn!(error = %e, "Failed to flush NATS connection");
    }

    metrics.print_summary();
    Ok(())
}

fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("voice_scam_shield={}", config.level).parse()?);

    match config.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        _ => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    Ok(())
}

fn build_gateway(client: &async_nats::Client, config: &TranscriptionConfig) -> TranscriptionGateway {
    config
        .engines
        .iter()
        .fold(TranscriptionGateway::from_config(config), |gateway, engine| {
            gateway.with_engine(
                Arc::new(NatsEngine::new(client.clone(), &engine.name, &engine.subject)),
                Duration::from_millis(engine.timeout_ms),
                engine.min_confidence,
            )
        })
}

async fn handle_message(
    kind: Inbound,
    message: Message,
    pipeline: &SessionPipeline,
    producer: &EventProducer,
    report_sink: &dyn ReportSink,
) {
    let Message { payload, reply, .. } = message;

    match kind {
        Inbound::Control => {
            let response = match serde_json::from_slice::<ControlRequest>(&payload) {
                Ok(ControlRequest::Start) => ControlResponse::started(pipeline.start_session()),
                Ok(ControlRequest::Stop { session_id }) => {
                    match pipeline.stop_session(&session_id).await {
                        Ok(()) => ControlResponse::ok(),
                        Err(e) => {
                            warn!(session_id = %session_id, error = %e, "Stop request failed");
                            ControlResponse::failed(e)
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize control request");
                    ControlResponse::failed(format!("invalid control request: {}", e))
                }
            };
            respond(producer, reply, &response).await;
        }

        Inbound::Chunk => {
            let outcome = match serde_json::from_slice::<ChunkMessage>(&payload) {
                Ok(chunk) => {
                    let result = pipeline
                        .submit_chunk(&chunk.session_id, chunk.sequence_number, chunk.payload)
                        .await;
                    if let Err(e) = &result {
                        debug!(
                            session_id = %chunk.session_id,
                            sequence_number = chunk.sequence_number,
                            reason = e.reason_code(),
                            "Chunk not accepted"
                        );
                    }
                    SubmitOutcome::from(&result)
                }
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize chunk");
                    SubmitOutcome {
                        accepted: false,
                        reason: Some("invalid_message".to_string()),
                        message: Some(e.to_string()),
                    }
                }
            };
            respond(producer, reply, &outcome).await;
        }

        Inbound::Analyze => match serde_json::from_slice::<AnalyzeRequest>(&payload) {
            Ok(request) => {
                let result = pipeline.classify_text(&request.text);
                info!(
                    label = %result.label,
                    risk_score = result.risk_score,
                    patterns = result.matched_patterns.len(),
                    "Text classified"
                );

                let report = CallReport::from_text(&request.text, result.clone());
                if let Err(e) = report_sink.save_result(&report).await {
                    error!(report_id = %report.report_id, error = %e, "Failed to save text report");
                }
                respond(producer, reply, &result).await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to deserialize analyze request");
                respond(
                    producer,
                    reply,
                    &ControlResponse::failed(format!("invalid analyze request: {}", e)),
                )
                .await;
            }
        },
    }
}

async fn respond<T: Serialize>(producer: &EventProducer, reply: Option<Subject>, body: &T) {
    let Some(reply) = reply else {
        return;
    };
    if let Err(e) = producer.reply(reply, body).await {
        error!(error = %e, "Failed to send reply");
    }
}
