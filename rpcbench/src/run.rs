use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use bytes::Bytes;
use rpcbench_core::{ExecutionMode, KeySource, Requests, TransportOptions, Work, WorkConfig};
use rpcbench_rpc::{RpcClientFactory, RpcEndpoints};

use crate::cli::{DEFAULT_PAYLOAD, OutputFormat, RunArgs};
use crate::exit_codes::ExitCode;
use crate::output::{self, RunPlan};
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    let out = output::formatter(args.output);

    let payload = read_payload(&args).await.map_err(RunError::InvalidInput)?;
    let config = work_config(&args, payload);
    config.validate()?;

    let plan = RunPlan {
        write_url: args.write_url.clone(),
        requests: config.effective_requests(),
        concurrency: config.concurrency,
        qps: config.qps,
        duration: config.duration,
        mode: config.mode,
    };

    let factory = RpcClientFactory::new(endpoints(&args));
    let mut work = Work::new(config, factory);
    if let Some(progress) = out.progress() {
        work = work.with_progress(progress);
    }
    let work = Arc::new(work);
    work.init();

    let interrupt = tokio::spawn({
        let work = work.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received; stopping run");
                work.stop();
            }
        }
    });

    out.print_header(&plan);
    let outcome = work.run().await;
    interrupt.abort();

    let summary = outcome?;
    out.print_summary(&summary)
        .context("failed to write summary")
        .map_err(RunError::RuntimeError)?;

    Ok(ExitCode::from_errors(summary.errors, args.fail_on_error))
}

async fn read_payload(args: &RunArgs) -> anyhow::Result<Bytes> {
    if let Some(path) = &args.payload_file {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read payload file: {}", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = raw.len(), "loaded payload file");
        return Ok(Bytes::from(raw));
    }

    let inline = args.payload.as_deref().unwrap_or(DEFAULT_PAYLOAD);
    Ok(Bytes::copy_from_slice(inline.as_bytes()))
}

fn work_config(args: &RunArgs, payload: Bytes) -> WorkConfig {
    WorkConfig {
        requests: Requests::Total(args.requests),
        concurrency: args.concurrency,
        qps: args.qps,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        duration: args.duration,
        mode: if args.raw_request {
            ExecutionMode::RawPreSigned
        } else {
            ExecutionMode::PerRequest
        },
        key_source: KeySource::parse(&args.key),
        transport: TransportOptions {
            disable_keep_alives: args.disable_keepalive,
            disable_compression: args.disable_compression,
            http2: args.h2,
            proxy: args.proxy.clone(),
        },
        payload,
        keep_records: args.output == OutputFormat::Csv,
    }
}

fn endpoints(args: &RunArgs) -> RpcEndpoints {
    RpcEndpoints {
        write_url: args.write_url.clone(),
        read_url: args.read_url.clone(),
        chain_id: args.chain_id.clone(),
        contract: args.contract.clone(),
        method: args.method.clone(),
    }
}
