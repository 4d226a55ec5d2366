use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let mut options = rpcbench_testserver::ChainOptions::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:0")
                })?;
                bind_addr = addr.parse()?;
            }
            "--chain-id" => {
                options.chain_id = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--chain-id requires a value"))?;
            }
            "--fail-every" => {
                let n = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--fail-every requires a number"))?;
                options.fail_every = Some(n.parse()?);
            }
            "--delay-ms" => {
                let ms = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--delay-ms requires a number"))?;
                options.delay = Some(Duration::from_millis(ms.parse()?));
            }
            "-h" | "--help" => {
                eprintln!(
                    "rpcbench-testserver\n\nUSAGE:\n  rpcbench-testserver [--bind 127.0.0.1:0] [--chain-id default] [--fail-every N] [--delay-ms MS]\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready. Write endpoint: <url>/rpc, read endpoint: <url>/query."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let stats = rpcbench_testserver::TestServerStats::default();
    let chain = Arc::new(rpcbench_testserver::Chain::default());
    let app = rpcbench_testserver::router(stats.clone(), chain, options);

    println!("HTTP_URL=http://{addr}");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;

    eprintln!(
        "accepted={} rejected={} injected_failures={}",
        stats.accepted_total(),
        stats.rejected_total(),
        stats.injected_failures()
    );
    Ok(())
}
