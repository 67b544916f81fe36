//! Call Simulator
//!
//! Replays scripted calls against a running service: starts a session,
//! streams the call as text chunks (optionally shuffled or with dropped
//! chunks), then stops the session. Without NATS it prints the chunks.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// Chunk message in the service's wire format
#[derive(Debug, Clone, Serialize)]
struct ChunkMessage {
    session_id: String,
    sequence_number: u64,
    payload: ChunkPayload,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum ChunkPayload {
    Text { text: String },
}

#[derive(Debug, Deserialize)]
struct ControlResponse {
    ok: bool,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitOutcome {
    accepted: bool,
    #[serde(default)]
    reason: Option<String>,
}

const SCAM_CALLS: &[&[&str]] = &[
    &[
        "Hello, this is officer Daniels calling from the IRS.",
        "Our records show you owe five thousand dollars in back taxes.",
        "If you do not pay immediately you will be arrested today.",
        "To verify your identity, give me your social security number.",
        "You need to wire the money now or we will take legal action.",
    ],
    &[
        "Hi, this is the fraud department at your bank.",
        "Your account has been suspended because of suspicious activity.",
        "We just need to confirm your account number and routing number.",
        "Please read me the verification code we sent to your phone.",
        "This is urgent, act now or the account will be closed.",
    ],
    &[
        "Congratulations, you are the winner of our lottery prize!",
        "To claim your prize we only need a small processing fee.",
        "You can pay with gift cards from any store, it is quick.",
        "Hurry, this is a limited time offer and expires today.",
    ],
];

const SAFE_CALLS: &[&[&str]] = &[
    &[
        "Hi mom, it's me, just calling to check in.",
        "Are we still on for dinner on Sunday?",
        "I can bring dessert if you want, maybe the apple pie.",
        "Okay, love you, see you then.",
    ],
    &[
        "Hello, this is the dental office confirming your appointment.",
        "You are scheduled for Thursday at two in the afternoon.",
        "Please call us back if you need to reschedule.",
    ],
];

/// Scripted call generator
struct CallGenerator {
    rng: rand::rngs::ThreadRng,
}

impl CallGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Pick a script; scam with probability `scam_rate`
    fn pick_script(&mut self, scam_rate: f64) -> (bool, &'static [&'static str]) {
        let scam = self.rng.gen_bool(scam_rate);
        let scripts = if scam { SCAM_CALLS } else { SAFE_CALLS };
        (scam, scripts[self.rng.gen_range(0..scripts.len())])
    }

    /// Sequence-numbered chunks in delivery order
    fn delivery_order(
        &mut self,
        script: &[&str],
        shuffle_rate: f64,
        drop_rate: f64,
    ) -> Vec<(u64, String)> {
        let mut chunks: Vec<(u64, String)> = script
            .iter()
            .enumerate()
            .map(|(i, line)| (i as u64 + 1, line.to_string()))
            .filter(|_| !self.rng.gen_bool(drop_rate))
            .collect();

        // Swap neighbouring chunks to exercise reordering
        for i in 1..chunks.len() {
            if self.rng.gen_bool(shuffle_rate) {
                chunks.swap(i - 1, i);
            }
        }
        if chunks.is_empty() {
            if let Some(line) = script.choose(&mut self.rng) {
                chunks.push((1, line.to_string()));
            }
        }
        chunks
    }
}

/// Probability argument at `index`, clamped to [0, 1]
fn rate_arg(args: &[String], index: usize, default: f64) -> f64 {
    args.get(index)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(default)
        .clamp(0.0, 1.0)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("call_simulator=info".parse()?),
        )
        .init();

    info!("Starting Call Simulator");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let calls: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(5);
    let scam_rate = rate_arg(&args, 3, 0.5);
    let shuffle_rate = rate_arg(&args, 4, 0.2);
    let drop_rate = rate_arg(&args, 5, 0.0);
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(300);
    let control_subject = "calls.control";
    let chunk_subject = "calls.chunks";

    info!(
        nats_url = %nats_url,
        calls = calls,
        scam_rate = scam_rate,
        shuffle_rate = shuffle_rate,
        drop_rate = drop_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(calls, scam_rate, shuffle_rate, drop_rate).await;
        }
    };

    let mut generator = CallGenerator::new();
    let mut scam_count = 0;
    let mut safe_count = 0;

    for call in 0..calls {
        let (scam, script) = generator.pick_script(scam_rate);
        if scam {
            scam_count += 1;
        } else {
            safe_count += 1;
        }

        let reply = client
            .request(control_subject, r#"{"action":"start"}"#.into())
            .await?;
        let started: ControlResponse = serde_json::from_slice(&reply.payload)?;
        let session_id = match (started.ok, started.session_id) {
            (true, Some(id)) => id,
            _ => {
                warn!(error = ?started.error, "Service refused to start a session");
                continue;
            }
        };
        info!(call = call + 1, session_id = %session_id, scam = scam, "Session started");

        for (sequence_number, text) in generator.delivery_order(script, shuffle_rate, drop_rate) {
            let message = ChunkMessage {
                session_id: session_id.clone(),
                sequence_number,
                payload: ChunkPayload::Text { text },
            };
            let payload = serde_json::to_vec(&message)?;
            let reply = client.request(chunk_subject, payload.into()).await?;
            let outcome: SubmitOutcome = serde_json::from_slice(&reply.payload)?;
            if !outcome.accepted {
                warn!(
                    session_id = %session_id,
                    sequence_number,
                    reason = ?outcome.reason,
                    "Chunk rejected"
                );
            }
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let stop = serde_json::json!({ "action": "stop", "session_id": session_id });
        let reply = client
            .request(control_subject, serde_json::to_vec(&stop)?.into())
            .await?;
        let stopped: ControlResponse = serde_json::from_slice(&reply.payload)?;
        if !stopped.ok {
            warn!(session_id = %session_id, error = ?stopped.error, "Stop request failed");
        }
    }

    info!(
        "Completed! Simulated {} calls ({} scam, {} safe)",
        calls, scam_count, safe_count
    );

    Ok(())
}

async fn run_dry_mode(
    calls: u64,
    scam_rate: f64,
    shuffle_rate: f64,
    drop_rate: f64,
) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = CallGenerator::new();

    for call in 0..calls {
        let (scam, script) = generator.pick_script(scam_rate);
        let session_id = format!("dry-run-{}", call + 1);
        info!(session_id = %session_id, scam = scam, "Simulated call");

        for (sequence_number, text) in generator.delivery_order(script, shuffle_rate, drop_rate) {
            let message = ChunkMessage {
                session_id: session_id.clone(),
                sequence_number,
                payload: ChunkPayload::Text { text },
            };
            info!("{}", serde_json::to_string(&message)?);
        }
    }

    Ok(())
}
