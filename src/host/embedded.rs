//! Embedded JavaScript host backed by `boa_engine`.
//!
//! A boa `Context` is not `Send`, so it lives on a dedicated worker thread for
//! the whole session and executions are queued to it one at a time. Globals
//! defined by one execution stay visible to the next, the same way a plugin
//! context behaves.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use anyhow::{Context as _, Result, anyhow};
use async_trait::async_trait;
use boa_engine::{Context, Source};
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::oneshot;

use super::{ExecutionOutcome, ScriptFailure, ScriptHost};

/// Wraps the user code so that sync throws, rejected promises and resolved
/// values all end up in this job's own slot as a JSON-friendly record.
///
/// The slot exists only while its job is being evaluated. A promise that
/// settles after its job was reported finds no slot and is dropped.
const HARNESS: &str = r#"
(function () {
  const slots = globalThis.__promptcanvasOutcomes || (globalThis.__promptcanvasOutcomes = {});
  const job = __PROMPTCANVAS_JOB__;
  slots[job] = null;
  const settle = (outcome) => {
    if (Object.prototype.hasOwnProperty.call(slots, job)) {
      slots[job] = outcome;
    }
  };
  const describe = (error) => {
    if (error instanceof Error) {
      const header = String(error);
      const trace = typeof error.stack === "string" ? error.stack : "";
      let stack = header;
      if (trace.startsWith(header)) {
        stack = trace;
      } else if (trace !== "") {
        stack = header + "\n" + trace;
      }
      return { ok: false, message: String(error.message), stack };
    }
    return { ok: false, message: String(error), stack: "" };
  };
  let pending;
  try {
    pending = Promise.resolve((0, eval)(__PROMPTCANVAS_SOURCE__));
  } catch (error) {
    pending = Promise.reject(error);
  }
  pending.then(
    (value) => {
      try {
        const json = JSON.stringify(value === undefined ? null : value);
        settle({ ok: true, json: json === undefined ? "null" : json });
      } catch (error) {
        settle(describe(error));
      }
    },
    (error) => settle(describe(error)),
  );
})();
"#;

const SOURCE_SLOT: &str = "__PROMPTCANVAS_SOURCE__";
const JOB_SLOT: &str = "__PROMPTCANVAS_JOB__";

/// Reads and releases one job's slot.
const OUTCOME_PROBE: &str = r#"
(function () {
  const slots = globalThis.__promptcanvasOutcomes || {};
  const outcome = slots[__PROMPTCANVAS_JOB__];
  delete slots[__PROMPTCANVAS_JOB__];
  return JSON.stringify(outcome === undefined ? null : outcome);
})();
"#;

struct Job {
    code: String,
    reply: oneshot::Sender<ExecutionOutcome>,
}

/// Record written by [`HARNESS`].
#[derive(Deserialize)]
struct HarnessOutcome {
    ok: bool,
    #[serde(default)]
    json: Option<String>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    stack: String,
}

pub struct EmbeddedHost {
    jobs: Sender<Job>,
}

impl EmbeddedHost {
    /// Starts the worker thread and evaluates every prelude script in order.
    /// A prelude that throws aborts start-up.
    pub fn start(prelude: Vec<String>) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        thread::Builder::new()
            .name("script-host".into())
            .spawn(move || run_worker(prelude, jobs_rx, ready_tx))
            .context("無法啟動腳本執行緒")?;

        match ready_rx.recv() {
            Ok(Ok(count)) => {
                info!("Embedded script host ready ({count} prelude scripts)");
                Ok(Self { jobs: jobs_tx })
            }
            Ok(Err(message)) => Err(anyhow!(message)),
            Err(_) => Err(anyhow!("script host thread exited during start-up")),
        }
    }
}

#[async_trait]
impl ScriptHost for EmbeddedHost {
    fn name(&self) -> &str {
        "embedded"
    }

    async fn execute(&self, code: &str) -> ExecutionOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            code: code.to_string(),
            reply: reply_tx,
        };
        if self.jobs.send(job).is_err() {
            return Err(ScriptFailure::new("The script host is no longer running", ""));
        }
        reply_rx.await.unwrap_or_else(|_| {
            Err(ScriptFailure::new(
                "The script host stopped before the code finished",
                "",
            ))
        })
    }
}

fn run_worker(
    prelude: Vec<String>,
    jobs: Receiver<Job>,
    ready: Sender<std::result::Result<usize, String>>,
) {
    let mut context = Context::default();
    for (index, source) in prelude.iter().enumerate() {
        if let Err(err) = context.eval(Source::from_bytes(source)) {
            let _ = ready.send(Err(format!("prelude script #{} failed: {}", index + 1, err)));
            return;
        }
    }
    let _ = context.run_jobs();
    if ready.send(Ok(prelude.len())).is_err() {
        return;
    }

    let mut next_job: u64 = 0;
    while let Ok(job) = jobs.recv() {
        next_job += 1;
        let outcome = evaluate(&mut context, next_job, &job.code);
        debug!("embedded execution finished: ok={}", outcome.is_ok());
        let _ = job.reply.send(outcome);
    }
}

fn evaluate(context: &mut Context, job: u64, code: &str) -> ExecutionOutcome {
    let literal = serde_json::to_string(code).map_err(|err| ScriptFailure::new(err.to_string(), ""))?;
    let job = job.to_string();
    let script = HARNESS.replace(JOB_SLOT, &job).replace(SOURCE_SLOT, &literal);
    let probe_script = OUTCOME_PROBE.replace(JOB_SLOT, &job);

    context
        .eval(Source::from_bytes(&script))
        .map_err(|err| ScriptFailure::new(err.to_string(), ""))?;
    // Drains the promise job queue so async code runs to completion.
    let _ = context.run_jobs();

    let probe = context
        .eval(Source::from_bytes(&probe_script))
        .map_err(|err| ScriptFailure::new(err.to_string(), ""))?;
    let text = probe
        .to_string(context)
        .map_err(|err| ScriptFailure::new(err.to_string(), ""))?
        .to_std_string_escaped();
    decode_outcome(&text)
}

fn decode_outcome(text: &str) -> ExecutionOutcome {
    let outcome: Option<HarnessOutcome> = serde_json::from_str(text)
        .map_err(|err| ScriptFailure::new(format!("unreadable execution result: {err}"), ""))?;
    match outcome {
        None => Err(ScriptFailure::new(
            "The code never settled: it is waiting on a promise nothing will resolve",
            "",
        )),
        Some(outcome) if outcome.ok => {
            let json = outcome.json.unwrap_or_else(|| "null".to_string());
            serde_json::from_str::<Value>(&json)
                .map_err(|err| ScriptFailure::new(format!("unreadable return value: {err}"), ""))
        }
        Some(outcome) => Err(ScriptFailure::new(outcome.message, outcome.stack)),
    }
}
